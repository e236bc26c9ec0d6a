//! SQLite-backed cache for document snapshots, freshness descriptors and
//! memoized answers.
//!
//! This module provides a persistent key→value cache using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Independent namespaces per collection
//! - Whole-namespace replacement inside a single transaction
//! - Automatic schema migrations
//! - Self-healing reopen of corrupt database files

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod namespace;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use namespace::{CacheScope, Namespace, NamespaceStats};
pub use store::PersistentCache;
