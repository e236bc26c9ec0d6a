//! Cache-related MCP tools.
//!
//! Scopes follow the CLI: `all`, `response`, `embedding` (the document
//! snapshot and its freshness descriptor), `freshness`, `documents`.

pub mod clear;
pub mod stats;
pub mod view;

pub use clear::{CacheClearParams, clear_impl};
pub use stats::{CacheStatsParams, stats_impl};
pub use view::{CacheViewParams, view_impl};
