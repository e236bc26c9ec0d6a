//! Namespace CRUD operations.
//!
//! Every namespace is a flat key→value table scoped by collection. Whole
//! namespaces are replaced inside one transaction, so readers observe either
//! the previous mapping or the new one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Logical partition of the persistent cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Memoized question→answer pairs.
    Responses,
    /// The freshness descriptor of the document snapshot.
    Freshness,
    /// The document snapshot itself.
    Documents,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Responses, Namespace::Freshness, Namespace::Documents];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Responses => "responses",
            Namespace::Freshness => "freshness",
            Namespace::Documents => "documents",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of namespaces addressed by a clear/view/stats operation.
///
/// `Embedding` names the document index cache as a whole: the snapshot and
/// its freshness descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    #[default]
    All,
    Response,
    Embedding,
    Freshness,
    Documents,
}

impl CacheScope {
    pub fn namespaces(self) -> &'static [Namespace] {
        match self {
            CacheScope::All => &Namespace::ALL,
            CacheScope::Response => &[Namespace::Responses],
            CacheScope::Embedding => &[Namespace::Freshness, Namespace::Documents],
            CacheScope::Freshness => &[Namespace::Freshness],
            CacheScope::Documents => &[Namespace::Documents],
        }
    }
}

impl FromStr for CacheScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(CacheScope::All),
            "response" | "responses" => Ok(CacheScope::Response),
            "embedding" => Ok(CacheScope::Embedding),
            "freshness" => Ok(CacheScope::Freshness),
            "documents" => Ok(CacheScope::Documents),
            _ => Err(format!("invalid cache scope: {s}")),
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheScope::All => "all",
            CacheScope::Response => "response",
            CacheScope::Embedding => "embedding",
            CacheScope::Freshness => "freshness",
            CacheScope::Documents => "documents",
        };
        f.write_str(name)
    }
}

/// Size summary of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub entries: u64,
    /// Total bytes of stored keys and values.
    pub bytes: u64,
    /// Most recent write, RFC 3339.
    pub last_updated: Option<String>,
}

impl CacheDb {
    /// Read every entry of a namespace.
    pub async fn load_entries(&self, collection: &str, namespace: Namespace) -> Result<BTreeMap<String, String>, Error> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<BTreeMap<String, String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM cache_entries WHERE collection = ?1 AND namespace = ?2")?;
                let rows = stmt.query_map(params![collection, namespace.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;

                let mut entries = BTreeMap::new();
                for row in rows {
                    let (key, value) = row?;
                    entries.insert(key, value);
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Replace the whole namespace with `entries`.
    ///
    /// The delete and the inserts commit together; a failure rolls back to
    /// the previous content.
    pub async fn replace_entries(
        &self, collection: &str, namespace: Namespace, entries: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let collection = collection.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM cache_entries WHERE collection = ?1 AND namespace = ?2",
                    params![collection, namespace.as_str()],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO cache_entries (collection, namespace, key, value, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for (key, value) in &entries {
                        stmt.execute(params![collection, namespace.as_str(), key, value, now])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a single entry.
    ///
    /// Returns None if the key doesn't exist in the namespace.
    pub async fn get_entry(&self, collection: &str, namespace: Namespace, key: &str) -> Result<Option<String>, Error> {
        let collection = collection.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM cache_entries WHERE collection = ?1 AND namespace = ?2 AND key = ?3",
                    params![collection, namespace.as_str(), key],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Whether an entry exists, without reading its value.
    pub async fn contains_entry(&self, collection: &str, namespace: Namespace, key: &str) -> Result<bool, Error> {
        let collection = collection.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let mut stmt = conn.prepare_cached(
                    "SELECT 1 FROM cache_entries WHERE collection = ?1 AND namespace = ?2 AND key = ?3",
                )?;
                Ok(stmt.exists(params![collection, namespace.as_str(), key])?)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite a single entry.
    pub async fn upsert_entry(
        &self, collection: &str, namespace: Namespace, key: &str, value: &str,
    ) -> Result<(), Error> {
        let collection = collection.to_string();
        let key = key.to_string();
        let value = value.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (collection, namespace, key, value, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(collection, namespace, key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![collection, namespace.as_str(), key, value, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry of a namespace.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_namespace(&self, collection: &str, namespace: Namespace) -> Result<u64, Error> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE collection = ?1 AND namespace = ?2",
                    params![collection, namespace.as_str()],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn namespace_stats(&self, collection: &str, namespace: Namespace) -> Result<NamespaceStats, Error> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<NamespaceStats, Error> {
                let (entries, bytes, last_updated) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0),
                            MAX(updated_at)
                     FROM cache_entries WHERE collection = ?1 AND namespace = ?2",
                    params![collection, namespace.as_str()],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, Option<String>>(2)?)),
                )?;

                Ok(NamespaceStats {
                    namespace,
                    entries: u64::try_from(entries).unwrap_or_default(),
                    bytes: u64::try_from(bytes).unwrap_or_default(),
                    last_updated,
                })
            })
            .await
            .map_err(Error::from)
    }
}
