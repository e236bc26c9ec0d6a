//! Core types and shared functionality for rocky.
//!
//! This crate provides:
//! - SQLite-backed namespaced cache with self-healing open
//! - Snapshot freshness policy and the index builder state machine
//! - Retrying batch fetch over a remote document source
//! - Answer memoization in front of the query engine
//! - Unified error types and layered configuration

pub mod answers;
pub mod cache;
pub mod config;
pub mod documents;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod index_builder;

pub use answers::{AnswerCache, QueryEngine};
pub use cache::{CacheDb, CacheScope, Namespace, NamespaceStats, PersistentCache};
pub use config::{AppConfig, ConfigError};
pub use documents::{Document, DocumentSnapshot};
pub use error::Error;
pub use fetcher::{DocumentSource, RetryPolicy, RetryingFetcher, SourceError};
pub use freshness::{FreshnessDescriptor, FreshnessPolicy, StaleReason};
pub use index_builder::{BuildOutcome, BuildState, IndexBuilder, RebuildCause, SnapshotOrigin};
