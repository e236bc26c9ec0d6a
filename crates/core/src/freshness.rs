//! Snapshot freshness decisions.
//!
//! The descriptor records which source ids a snapshot was built from and
//! when. `FreshnessPolicy` compares it with the current id list and clock;
//! it is the only gate that lets a query path reach the remote source.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted snapshot layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Fingerprint of the cached document snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FreshnessDescriptor {
    /// Source ids in the order they were fetched.
    pub source_ids: Vec<String>,
    pub fingerprint_at: DateTime<Utc>,
    pub format_version: u32,
}

impl FreshnessDescriptor {
    pub fn new(source_ids: Vec<String>, fingerprint_at: DateTime<Utc>) -> Self {
        Self { source_ids, fingerprint_at, format_version: CACHE_FORMAT_VERSION }
    }
}

/// Why a snapshot must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    ColdStart,
    FormatChanged,
    SourcesChanged,
    Expired,
    SnapshotMissing,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            StaleReason::ColdStart => "no cached descriptor",
            StaleReason::FormatChanged => "cache format changed",
            StaleReason::SourcesChanged => "source ids changed",
            StaleReason::Expired => "cache expired",
            StaleReason::SnapshotMissing => "document snapshot missing",
        };
        f.write_str(reason)
    }
}

/// First reason the cached snapshot is unusable, or None when it is fresh.
///
/// The id list comparison is order-sensitive: the snapshot preserves fetch
/// order, so a reordered list produces a different snapshot.
pub fn staleness(
    current_ids: &[String], cached: Option<&FreshnessDescriptor>, snapshot_present: bool, now: DateTime<Utc>,
    expiration: chrono::Duration,
) -> Option<StaleReason> {
    let Some(cached) = cached else {
        return Some(StaleReason::ColdStart);
    };

    if cached.format_version != CACHE_FORMAT_VERSION {
        return Some(StaleReason::FormatChanged);
    }
    if cached.source_ids.as_slice() != current_ids {
        return Some(StaleReason::SourcesChanged);
    }
    if now.signed_duration_since(cached.fingerprint_at) > expiration {
        return Some(StaleReason::Expired);
    }
    if !snapshot_present {
        return Some(StaleReason::SnapshotMissing);
    }
    None
}

pub fn is_stale(
    current_ids: &[String], cached: Option<&FreshnessDescriptor>, snapshot_present: bool, now: DateTime<Utc>,
    expiration: chrono::Duration,
) -> bool {
    staleness(current_ids, cached, snapshot_present, now, expiration).is_some()
}

/// Freshness check bound to a configured expiration.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    expiration: chrono::Duration,
}

impl FreshnessPolicy {
    pub fn new(expiration: chrono::Duration) -> Self {
        Self { expiration }
    }

    pub fn expiration(&self) -> chrono::Duration {
        self.expiration
    }

    pub fn check(
        &self, current_ids: &[String], cached: Option<&FreshnessDescriptor>, snapshot_present: bool,
        now: DateTime<Utc>,
    ) -> Option<StaleReason> {
        staleness(current_ids, cached, snapshot_present, now, self.expiration)
    }

    pub fn is_stale(
        &self, current_ids: &[String], cached: Option<&FreshnessDescriptor>, snapshot_present: bool,
        now: DateTime<Utc>,
    ) -> bool {
        self.check(current_ids, cached, snapshot_present, now).is_some()
    }
}
