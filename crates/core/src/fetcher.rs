//! Retrying batch fetch over an unreliable document source.
//!
//! ### Per-item behavior
//! - Transient failures wait a constant backoff and retry, up to
//!   `max_attempts` attempts in total (`tokio_retry` with a fixed interval).
//! - Unexpected failures are not retried.
//! - Either way the item degrades to a single placeholder document; the
//!   batch itself never fails.
//!
//! ### Ordering
//! Items may be fetched concurrently, but the output is always in input
//! order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

use crate::Error;
use crate::documents::Document;

/// Failure of a single source fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network, connection, timeout or throttling failure; worth retrying.
    #[error("{0}")]
    Transient(String),

    /// Anything else; retrying will not help.
    #[error("{0}")]
    Unexpected(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Remote document source, fetched one item at a time.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch one source item. A single item may expand to several documents.
    async fn fetch(&self, id: &str) -> Result<Vec<Document>, SourceError>;
}

/// Bounded retry with a constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `max_attempts` is 0.
    pub fn new(max_attempts: u32, backoff: Duration) -> Result<Self, Error> {
        if max_attempts == 0 {
            return Err(Error::InvalidInput("max_attempts must be at least 1".into()));
        }
        Ok(Self { max_attempts, backoff })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, backoff: Duration::from_secs(3) }
    }
}

/// Fetches a batch of ids with per-item retry and failure isolation.
#[derive(Clone)]
pub struct RetryingFetcher {
    source: Arc<dyn DocumentSource>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn DocumentSource>, policy: RetryPolicy) -> Self {
        Self { source, policy, concurrency: 1 }
    }

    /// Fetch up to `concurrency` ids at once. Values below 1 mean sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch every id, returning documents in input order.
    ///
    /// Each id contributes its documents on success or exactly one
    /// placeholder on failure.
    pub async fn fetch_all(&self, ids: &[String]) -> Vec<Document> {
        let batches: Vec<Vec<Document>> = stream::iter(ids.iter().cloned())
            .map(|id| async move { self.fetch_one(&id).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let documents: Vec<Document> = batches.into_iter().flatten().collect();
        let failed = documents.iter().filter(|d| d.is_placeholder()).count();
        tracing::info!(ids = ids.len(), documents = documents.len(), failed, "fetched source documents");
        documents
    }

    async fn fetch_one(&self, id: &str) -> Vec<Document> {
        let max_attempts = self.policy.max_attempts;
        let retries = FixedInterval::new(self.policy.backoff).take(max_attempts.saturating_sub(1) as usize);
        let source = &self.source;
        let mut attempt = 0u32;

        let fetched = RetryIf::spawn(
            retries,
            move || {
                attempt += 1;
                tracing::info!(id, attempt, max_attempts, "loading source item");
                source.fetch(id)
            },
            |e: &SourceError| {
                if e.is_transient() {
                    tracing::warn!(id, error = %e, delay = ?self.policy.backoff, "transient error loading source item");
                }
                e.is_transient()
            },
        )
        .await;

        match fetched {
            Ok(documents) => documents,
            Err(SourceError::Transient(message)) => {
                tracing::error!(id, attempts = max_attempts, error = %message, "giving up on source item");
                vec![Document::placeholder(id, message)]
            }
            Err(SourceError::Unexpected(message)) => {
                tracing::error!(id, error = %message, "unexpected error loading source item");
                vec![Document::placeholder(id, message)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted source: each id maps to a fixed behavior, attempts are counted.
    #[derive(Default)]
    struct ScriptedSource {
        transient: Vec<String>,
        unexpected: Vec<String>,
        flaky_until: HashMap<String, u32>,
        attempts: Mutex<HashMap<String, u32>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn attempts(&self, id: &str) -> u32 {
            self.attempts.lock().unwrap().get(id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl DocumentSource for ScriptedSource {
        async fn fetch(&self, id: &str) -> Result<Vec<Document>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let count = attempts.entry(id.to_string()).or_default();
                *count += 1;
                *count
            };

            if self.transient.iter().any(|t| t == id) {
                return Err(SourceError::Transient(format!("connection reset ({attempt})")));
            }
            if self.unexpected.iter().any(|u| u == id) {
                return Err(SourceError::Unexpected("page is not shared with the integration".into()));
            }
            if let Some(until) = self.flaky_until.get(id)
                && attempt < *until
            {
                return Err(SourceError::Transient("proxy error".into()));
            }
            Ok(vec![Document::new(id, format!("content of {id}"))])
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(3)).unwrap()
    }

    #[test]
    fn test_policy_rejects_zero_attempts() {
        assert!(RetryPolicy::new(0, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_item_becomes_placeholder_after_max_attempts() {
        let source = Arc::new(ScriptedSource { transient: ids(&["b"]), ..Default::default() });
        let fetcher = RetryingFetcher::new(source.clone(), policy(3));

        let start = tokio::time::Instant::now();
        let documents = fetcher.fetch_all(&ids(&["a", "b", "c"])).await;
        let elapsed = start.elapsed();

        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0], Document::new("a", "content of a"));
        assert_eq!(documents[1].id, "b");
        assert_eq!(documents[1].fetch_error.as_deref(), Some("connection reset (3)"));
        assert_eq!(documents[2], Document::new("c", "content of c"));

        assert_eq!(source.attempts("b"), 3);
        // Two backoff sleeps of 3s each, none for the healthy items.
        assert_eq!(elapsed, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_error_is_not_retried() {
        let source = Arc::new(ScriptedSource { unexpected: ids(&["a"]), ..Default::default() });
        let fetcher = RetryingFetcher::new(source.clone(), policy(5));

        let start = tokio::time::Instant::now();
        let documents = fetcher.fetch_all(&ids(&["a"])).await;

        assert_eq!(documents.len(), 1);
        assert!(documents[0].is_placeholder());
        assert_eq!(source.attempts("a"), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_item_recovers() {
        let mut flaky_until = HashMap::new();
        flaky_until.insert("a".to_string(), 2);
        let source = Arc::new(ScriptedSource { flaky_until, ..Default::default() });
        let fetcher = RetryingFetcher::new(source.clone(), policy(3));

        let documents = fetcher.fetch_all(&ids(&["a"])).await;

        assert_eq!(documents, vec![Document::new("a", "content of a")]);
        assert_eq!(source.attempts("a"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_sleeps() {
        let source = Arc::new(ScriptedSource { transient: ids(&["a"]), ..Default::default() });
        let fetcher = RetryingFetcher::new(source.clone(), policy(1));

        let start = tokio::time::Instant::now();
        let documents = fetcher.fetch_all(&ids(&["a"])).await;

        assert!(documents[0].is_placeholder());
        assert_eq!(source.attempts("a"), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetch_preserves_order() {
        let source = Arc::new(ScriptedSource { transient: ids(&["a"]), ..Default::default() });
        let fetcher = RetryingFetcher::new(source.clone(), policy(2)).with_concurrency(4);

        let documents = fetcher.fetch_all(&ids(&["a", "b", "c", "d", "e"])).await;

        let order: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
        assert!(documents[0].is_placeholder());
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_runs_on_spawned_task() {
        let source = Arc::new(ScriptedSource { transient: ids(&["b"]), ..Default::default() });
        let fetcher = RetryingFetcher::new(source, policy(2)).with_concurrency(2);
        let batch = ids(&["a", "b"]);

        let documents = tokio::spawn(async move { fetcher.fetch_all(&batch).await }).await.unwrap();

        assert_eq!(documents.len(), 2);
        assert!(documents[1].is_placeholder());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fetcher = RetryingFetcher::new(Arc::new(ScriptedSource::default()), policy(3));
        assert!(fetcher.fetch_all(&[]).await.is_empty());
    }
}
