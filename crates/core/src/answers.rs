//! Question→answer memoization in front of the query engine.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::Error;
use crate::cache::hash::question_digest;
use crate::cache::{CacheScope, Namespace, PersistentCache};

const APOLOGY_PREFIX: &str = "I'm sorry, I encountered an error while processing your question";

/// Answers a question from the indexed documents.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<String, Error>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnswerRecord {
    answer: String,
    answered_at: DateTime<Utc>,
}

type InFlight = Arc<OnceCell<Result<String, String>>>;

/// Memoizes answers by question digest.
///
/// Concurrent asks for the same question share one call to the answer
/// function. Failed answers are never cached.
pub struct AnswerCache {
    cache: PersistentCache,
    ttl: Option<chrono::Duration>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl AnswerCache {
    pub fn new(cache: PersistentCache) -> Self {
        Self { cache, ttl: None, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Expire memoized answers older than `ttl`.
    pub fn with_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    /// Answer `question`, calling `answer_fn` only on a cache miss.
    ///
    /// Errors from `answer_fn` come back as a user-facing apology string.
    pub async fn ask<F, Fut, E>(&self, question: &str, answer_fn: F) -> String
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let digest = question_digest(question);

        if let Some(answer) = self.lookup(&digest).await {
            tracing::info!(digest = %digest, "using cached response");
            return answer;
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(digest.clone()).or_default())
        };

        let owned_question = question.to_string();
        let key = digest.as_str();
        let result = cell
            .get_or_init(move || async move {
                // A previous caller may have finished between our lookup and
                // joining the in-flight map.
                if let Some(answer) = self.lookup(key).await {
                    return Ok(answer);
                }

                match answer_fn(owned_question).await {
                    Ok(answer) => {
                        self.store(key, &answer).await;
                        Ok(answer)
                    }
                    Err(e) => {
                        tracing::error!(digest = key, error = %e, "error querying the language model");
                        Err(e.to_string())
                    }
                }
            })
            .await
            .clone();

        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.get(&digest).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                in_flight.remove(&digest);
            }
        }

        match result {
            Ok(answer) => answer,
            Err(message) => format!("{APOLOGY_PREFIX}: {message}"),
        }
    }

    /// Convenience wrapper over [`ask`](Self::ask) for a [`QueryEngine`].
    pub async fn ask_engine(&self, question: &str, engine: &dyn QueryEngine) -> String {
        self.ask(question, move |q| async move { engine.query(&q).await }).await
    }

    /// Clear the namespaces named by `scope`.
    pub async fn clear(&self, scope: CacheScope) -> bool {
        self.cache.clear_scope(scope).await
    }

    async fn lookup(&self, digest: &str) -> Option<String> {
        let record: AnswerRecord = self.cache.load_record(Namespace::Responses, digest).await?;
        if let Some(ttl) = self.ttl
            && Utc::now().signed_duration_since(record.answered_at) > ttl
        {
            tracing::debug!(digest, "cached response expired");
            return None;
        }
        Some(record.answer)
    }

    async fn store(&self, digest: &str, answer: &str) {
        let record = AnswerRecord { answer: answer.to_string(), answered_at: Utc::now() };
        self.cache.save_record(Namespace::Responses, digest, &record).await;
    }
}

/// Whether `text` is the apology returned for a failed answer.
pub fn is_apology(text: &str) -> bool {
    text.starts_with(APOLOGY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn answers() -> AnswerCache {
        AnswerCache::new(PersistentCache::open_in_memory("rocky").await.unwrap())
    }

    #[tokio::test]
    async fn test_second_ask_is_served_from_cache() {
        let cache = answers().await;
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let answer_fn = move |_q: String| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("Paris".to_string())
        };

        let first = cache.ask("What is the capital of France?", answer_fn).await;
        let second = cache.ask("What is the capital of France?", answer_fn).await;

        assert_eq!(first, "Paris");
        assert_eq!(second, "Paris");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = answers().await;
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let failed = cache
            .ask("Who founded the company?", move |_q| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(Error::QueryFailed("upstream 503".into()))
            })
            .await;
        assert!(is_apology(&failed));
        assert!(failed.contains("upstream 503"));

        let ok = cache
            .ask("Who founded the company?", move |_q| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>("Two engineers".to_string())
            })
            .await;
        assert_eq!(ok, "Two engineers");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_all_forces_new_answer() {
        let cache = answers().await;
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let answer_fn = move |_q: String| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("42".to_string())
        };

        cache.ask("meaning?", answer_fn).await;
        assert!(cache.clear(CacheScope::All).await);
        for namespace in Namespace::ALL {
            assert!(cache.cache().load(namespace).await.is_empty());
        }

        cache.ask("meaning?", answer_fn).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_embedding_keeps_answers() {
        let cache = answers().await;
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let answer_fn = move |_q: String| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("yes".to_string())
        };

        cache.ask("cached?", answer_fn).await;
        cache.clear(CacheScope::Embedding).await;
        cache.ask("cached?", answer_fn).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_questions_share_one_call() {
        let cache = answers().await;
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let answer_fn = move |_q: String| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, Error>("shared".to_string())
        };

        let (a, b, c) = tokio::join!(
            cache.ask("same question", answer_fn),
            cache.ask("same question", answer_fn),
            cache.ask("same question", answer_fn),
        );

        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("shared", "shared", "shared"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_expires_answers() {
        let cache = answers().await.with_ttl(Some(chrono::Duration::zero()));
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let answer_fn = move |_q: String| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("fresh".to_string())
        };

        cache.ask("time?", answer_fn).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.ask("time?", answer_fn).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct StaticEngine;

    #[async_trait]
    impl QueryEngine for StaticEngine {
        async fn query(&self, question: &str) -> Result<String, Error> {
            Ok(format!("echo: {question}"))
        }
    }

    #[tokio::test]
    async fn test_ask_engine() {
        let cache = answers().await;
        assert_eq!(cache.ask_engine("hi", &StaticEngine).await, "echo: hi");
    }
}
