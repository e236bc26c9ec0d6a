//! Degrading front for the cache database.
//!
//! `PersistentCache` never hands a cache failure to its caller: reads fall
//! back to an empty namespace and writes are logged and dropped. The raw
//! `CacheDb` API stays available for tooling that wants the errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::connection::CacheDb;
use super::namespace::{CacheScope, Namespace, NamespaceStats};
use crate::Error;

/// Namespaced key→value cache backed by a local SQLite file.
#[derive(Clone, Debug)]
pub struct PersistentCache {
    db: CacheDb,
    collection: String,
}

impl PersistentCache {
    /// Open the cache at `path`, creating parent directories as needed.
    ///
    /// A file that cannot be opened as a cache database is moved aside to
    /// `<path>.corrupt-<unix-ts>` and replaced with an empty one.
    pub async fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self, Error> {
        let path = path.as_ref();
        let collection = collection.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = match CacheDb::open(path).await {
            Ok(db) => db,
            Err(e) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(e);
                }
                let quarantine = quarantine_path(path);
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %quarantine.display(),
                    error = %e,
                    "cache database unreadable; starting with an empty cache"
                );
                tokio::fs::rename(path, &quarantine).await?;
                for suffix in ["-wal", "-shm"] {
                    let sidecar = sidecar_path(path, suffix);
                    if tokio::fs::try_exists(&sidecar).await.unwrap_or(false) {
                        tokio::fs::remove_file(&sidecar).await?;
                    }
                }
                CacheDb::open(path).await?
            }
        };

        Ok(Self { db, collection })
    }

    /// In-memory cache for tests.
    pub async fn open_in_memory(collection: impl Into<String>) -> Result<Self, Error> {
        Ok(Self { db: CacheDb::open_in_memory().await?, collection: collection.into() })
    }

    pub fn from_db(db: CacheDb, collection: impl Into<String>) -> Self {
        Self { db, collection: collection.into() }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Read a whole namespace. Unreadable namespaces come back empty.
    pub async fn load(&self, namespace: Namespace) -> BTreeMap<String, String> {
        match self.db.load_entries(&self.collection, namespace).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(%namespace, error = %e, "failed to load cache namespace; treating as empty");
                BTreeMap::new()
            }
        }
    }

    /// Replace a whole namespace atomically.
    ///
    /// Returns whether the write landed; failures are logged, not raised.
    pub async fn save(&self, namespace: Namespace, entries: &BTreeMap<String, String>) -> bool {
        match self.db.replace_entries(&self.collection, namespace, entries.clone()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%namespace, error = %e, "failed to save cache namespace");
                false
            }
        }
    }

    /// Remove all content of a namespace.
    pub async fn clear(&self, namespace: Namespace) -> bool {
        match self.db.delete_namespace(&self.collection, namespace).await {
            Ok(deleted) => {
                tracing::info!(%namespace, deleted, "cache namespace cleared");
                true
            }
            Err(e) => {
                tracing::error!(%namespace, error = %e, "failed to clear cache namespace");
                false
            }
        }
    }

    /// Clear every namespace named by `scope`.
    pub async fn clear_scope(&self, scope: CacheScope) -> bool {
        let mut all_cleared = true;
        for namespace in scope.namespaces() {
            all_cleared &= self.clear(*namespace).await;
        }
        if scope == CacheScope::All {
            tracing::info!("all caches cleared");
        }
        all_cleared
    }

    pub async fn get(&self, namespace: Namespace, key: &str) -> Option<String> {
        match self.db.get_entry(&self.collection, namespace, key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%namespace, key, error = %e, "failed to read cache entry; treating as miss");
                None
            }
        }
    }

    pub async fn contains(&self, namespace: Namespace, key: &str) -> bool {
        match self.db.contains_entry(&self.collection, namespace, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%namespace, key, error = %e, "failed to check cache entry; treating as miss");
                false
            }
        }
    }

    pub async fn put(&self, namespace: Namespace, key: &str, value: &str) -> bool {
        match self.db.upsert_entry(&self.collection, namespace, key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%namespace, key, error = %e, "failed to write cache entry");
                false
            }
        }
    }

    /// Read a JSON record. A record that no longer decodes counts as absent.
    pub async fn load_record<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        let raw = self.get(namespace, key).await?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(%namespace, key, error = %e, "cached record is corrupt; ignoring it");
                None
            }
        }
    }

    pub async fn save_record<T: Serialize>(&self, namespace: Namespace, key: &str, record: &T) -> bool {
        match serde_json::to_string(record) {
            Ok(raw) => self.put(namespace, key, &raw).await,
            Err(e) => {
                tracing::error!(%namespace, key, error = %e, "failed to encode cache record");
                false
            }
        }
    }

    /// Per-namespace statistics for the scope. Unlike the other accessors,
    /// errors are returned.
    pub async fn stats(&self, scope: CacheScope) -> Result<Vec<NamespaceStats>, Error> {
        let mut stats = Vec::with_capacity(scope.namespaces().len());
        for namespace in scope.namespaces() {
            stats.push(self.db.namespace_stats(&self.collection, *namespace).await?);
        }
        Ok(stats)
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    sidecar_path(path, &format!(".corrupt-{}", chrono::Utc::now().timestamp()))
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
