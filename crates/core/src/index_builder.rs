//! Freshness-aware document set orchestration.
//!
//! `IndexBuilder` serves the cached snapshot while it is fresh and rebuilds
//! it from the remote source otherwise:
//!
//! ```text
//! ColdStart ──▶ Fetching ──▶ Ready
//!                  ▲           │
//!                  └─ stale ───┘
//! ```
//!
//! The snapshot is written before its descriptor. A descriptor is only
//! written once its snapshot landed, and a descriptor without a snapshot is
//! stale anyway.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::cache::{Namespace, PersistentCache};
use crate::documents::DocumentSnapshot;
use crate::fetcher::RetryingFetcher;
use crate::freshness::{FreshnessDescriptor, FreshnessPolicy, StaleReason};

const DESCRIPTOR_KEY: &str = "descriptor";
const SNAPSHOT_KEY: &str = "snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    ColdStart,
    Fetching,
    Ready,
}

/// Why the snapshot was rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildCause {
    Forced,
    Stale(StaleReason),
}

/// Where a returned snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Cache,
    Rebuilt(RebuildCause),
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub snapshot: DocumentSnapshot,
    pub origin: SnapshotOrigin,
}

impl BuildOutcome {
    pub fn rebuilt(&self) -> bool {
        matches!(self.origin, SnapshotOrigin::Rebuilt(_))
    }
}

/// Last snapshot this builder read or wrote, with the descriptor it was
/// stored under.
struct Loaded {
    descriptor: FreshnessDescriptor,
    snapshot: DocumentSnapshot,
}

struct Inner {
    state: BuildState,
    loaded: Option<Loaded>,
}

pub struct IndexBuilder {
    cache: PersistentCache,
    fetcher: RetryingFetcher,
    policy: FreshnessPolicy,
    source_ids: Vec<String>,
    inner: Mutex<Inner>,
}

impl IndexBuilder {
    pub fn new(
        cache: PersistentCache, fetcher: RetryingFetcher, policy: FreshnessPolicy, source_ids: Vec<String>,
    ) -> Self {
        let inner = Mutex::new(Inner { state: BuildState::ColdStart, loaded: None });
        Self { cache, fetcher, policy, source_ids, inner }
    }

    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }

    pub async fn state(&self) -> BuildState {
        self.inner.lock().await.state
    }

    /// Current documents, rebuilt from the source when forced or stale.
    pub async fn current_documents(&self, force_rebuild: bool) -> DocumentSnapshot {
        self.build(force_rebuild, Utc::now()).await.snapshot
    }

    /// Same as [`current_documents`](Self::current_documents) with an
    /// explicit clock, reporting where the snapshot came from.
    ///
    /// Concurrent calls are serialized so one rebuild runs at a time. The
    /// stored snapshot is only decoded again when its descriptor changed
    /// underneath this builder.
    pub async fn build(&self, force_rebuild: bool, now: DateTime<Utc>) -> BuildOutcome {
        let mut inner = self.inner.lock().await;

        let descriptor: Option<FreshnessDescriptor> = self.cache.load_record(Namespace::Freshness, DESCRIPTOR_KEY).await;
        let reusable = inner.loaded.take().filter(|loaded| descriptor.as_ref() == Some(&loaded.descriptor));
        let snapshot = match reusable {
            Some(loaded) => self.cache.contains(Namespace::Documents, SNAPSHOT_KEY).await.then_some(loaded.snapshot),
            None => self.cache.load_record(Namespace::Documents, SNAPSHOT_KEY).await,
        };

        let cause = if force_rebuild {
            Some(RebuildCause::Forced)
        } else {
            self.policy
                .check(&self.source_ids, descriptor.as_ref(), snapshot.is_some(), now)
                .map(RebuildCause::Stale)
        };

        let Some(cause) = cause else {
            inner.state = BuildState::Ready;
            let snapshot = snapshot.unwrap_or_default();
            tracing::info!(documents = snapshot.len(), "using cached documents; skipping source fetch");
            if let Some(descriptor) = descriptor {
                inner.loaded = Some(Loaded { descriptor, snapshot: snapshot.clone() });
            }
            return BuildOutcome { snapshot, origin: SnapshotOrigin::Cache };
        };

        match cause {
            RebuildCause::Forced => tracing::info!("forcing rebuild of the document snapshot"),
            RebuildCause::Stale(reason) => tracing::info!(%reason, "document snapshot is stale; rebuilding"),
        }

        inner.state = BuildState::Fetching;
        let snapshot = DocumentSnapshot::new(self.fetcher.fetch_all(&self.source_ids).await);

        if self.cache.save_record(Namespace::Documents, SNAPSHOT_KEY, &snapshot).await {
            let descriptor = FreshnessDescriptor::new(self.source_ids.clone(), now);
            if self.cache.save_record(Namespace::Freshness, DESCRIPTOR_KEY, &descriptor).await {
                tracing::info!(documents = snapshot.len(), "document snapshot cached");
                inner.loaded = Some(Loaded { descriptor, snapshot: snapshot.clone() });
            }
        } else {
            tracing::warn!("document snapshot not cached; the next call will rebuild");
        }

        inner.state = BuildState::Ready;
        BuildOutcome { snapshot, origin: SnapshotOrigin::Rebuilt(cause) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use crate::fetcher::{DocumentSource, RetryPolicy, SourceError};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentSource for CountingSource {
        async fn fetch(&self, id: &str) -> Result<Vec<Document>, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Document::new(id, format!("{id} v{n}"))])
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    async fn builder(cache: PersistentCache, source: Arc<CountingSource>, list: &[&str]) -> IndexBuilder {
        let fetcher = RetryingFetcher::new(source, RetryPolicy::new(1, std::time::Duration::ZERO).unwrap());
        IndexBuilder::new(cache, fetcher, FreshnessPolicy::new(Duration::hours(24)), ids(list))
    }

    #[tokio::test]
    async fn test_cold_start_fetches_then_serves_from_cache() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache, source.clone(), &["a", "b"]).await;
        assert_eq!(builder.state().await, BuildState::ColdStart);

        let first = builder.build(false, at(0)).await;
        assert_eq!(first.origin, SnapshotOrigin::Rebuilt(RebuildCause::Stale(StaleReason::ColdStart)));
        assert_eq!(first.snapshot.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(builder.state().await, BuildState::Ready);

        let second = builder.build(false, at(1)).await;
        assert_eq!(second.origin, SnapshotOrigin::Cache);
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_rebuilt() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache, source.clone(), &["a"]).await;

        builder.build(false, at(0)).await;
        let later = builder.build(false, at(0) + Duration::hours(25)).await;

        assert_eq!(later.origin, SnapshotOrigin::Rebuilt(RebuildCause::Stale(StaleReason::Expired)));
        assert_eq!(later.snapshot.documents[0].text, "a v1");
    }

    #[tokio::test]
    async fn test_force_rebuild_bypasses_fresh_cache() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache, source.clone(), &["a"]).await;

        builder.build(false, at(0)).await;
        let forced = builder.build(true, at(0)).await;

        assert_eq!(forced.origin, SnapshotOrigin::Rebuilt(RebuildCause::Forced));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_source_list_is_rebuilt() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());

        builder(cache.clone(), source.clone(), &["a"]).await.build(false, at(0)).await;
        let outcome = builder(cache, source.clone(), &["a", "b"]).await.build(false, at(1)).await;

        assert_eq!(outcome.origin, SnapshotOrigin::Rebuilt(RebuildCause::Stale(StaleReason::SourcesChanged)));
        assert_eq!(outcome.snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_snapshot_triggers_rebuild() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache.clone(), source.clone(), &["a"]).await;

        builder.build(false, at(0)).await;
        cache.clear(Namespace::Documents).await;

        let outcome = builder.build(false, at(1)).await;
        assert_eq!(outcome.origin, SnapshotOrigin::Rebuilt(RebuildCause::Stale(StaleReason::SnapshotMissing)));
        assert_eq!(outcome.snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_persists_snapshot_and_descriptor() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache.clone(), source, &["a", "b"]).await;

        builder.build(false, at(2)).await;

        let descriptor: FreshnessDescriptor = cache.load_record(Namespace::Freshness, DESCRIPTOR_KEY).await.unwrap();
        assert_eq!(descriptor.source_ids, ids(&["a", "b"]));
        assert_eq!(descriptor.fingerprint_at, at(2));

        let snapshot: DocumentSnapshot = cache.load_record(Namespace::Documents, SNAPSHOT_KEY).await.unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_build_reuses_loaded_snapshot() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache.clone(), source.clone(), &["a"]).await;

        let first = builder.build(false, at(0)).await;
        // The stored snapshot is not decoded again while its descriptor is unchanged.
        cache.put(Namespace::Documents, SNAPSHOT_KEY, "{not json").await;

        let second = builder.build(false, at(1)).await;
        assert_eq!(second.origin, SnapshotOrigin::Cache);
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleared_cache_invalidates_loaded_snapshot() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache.clone(), source.clone(), &["a"]).await;

        builder.build(false, at(0)).await;
        cache.clear_scope(crate::cache::CacheScope::Embedding).await;

        let outcome = builder.build(false, at(1)).await;
        assert_eq!(outcome.origin, SnapshotOrigin::Rebuilt(RebuildCause::Stale(StaleReason::ColdStart)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_current_documents_uses_wall_clock() {
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        let source = Arc::new(CountingSource::default());
        let builder = builder(cache, source.clone(), &["a"]).await;

        let first = builder.current_documents(false).await;
        let second = builder.current_documents(false).await;

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
