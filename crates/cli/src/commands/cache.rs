//! `rocky cache`: inspect or clear the local cache without touching Notion.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use rocky_core::{AppConfig, CacheScope, NamespaceStats, PersistentCache};

const VIEW_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheAction {
    Clear,
    View,
    Stats,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Action to perform on the cache.
    #[arg(long, value_enum, default_value_t = CacheAction::Stats)]
    pub action: CacheAction,

    /// Which cache to operate on: all, response, embedding, freshness, documents.
    #[arg(long, visible_alias = "type", default_value_t = CacheScope::All)]
    pub scope: CacheScope,
}

pub async fn run(config: &AppConfig, args: CacheArgs) -> Result<()> {
    let cache = PersistentCache::open(&config.db_path, config.collection.clone())
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;

    let report = match args.action {
        CacheAction::Clear => clear(&cache, args.scope).await,
        CacheAction::View => view(&cache, args.scope).await,
        CacheAction::Stats => render_stats(&cache.stats(args.scope).await?),
    };
    print!("{report}");
    Ok(())
}

async fn clear(cache: &PersistentCache, scope: CacheScope) -> String {
    let mut out = String::new();
    for namespace in scope.namespaces() {
        if cache.clear(*namespace).await {
            let _ = writeln!(out, "{namespace} cache cleared.");
        } else {
            let _ = writeln!(out, "{namespace} cache could not be cleared; see log.");
        }
    }
    if scope == CacheScope::All {
        out.push_str("All caches cleared.\n");
    }
    out
}

async fn view(cache: &PersistentCache, scope: CacheScope) -> String {
    let mut namespaces = BTreeMap::new();
    for namespace in scope.namespaces() {
        namespaces.insert(namespace.to_string(), cache.load(*namespace).await);
    }
    render_view(&namespaces)
}

pub fn render_view(namespaces: &BTreeMap<String, BTreeMap<String, String>>) -> String {
    let mut out = String::new();
    for (namespace, entries) in namespaces {
        let _ = writeln!(out, "{namespace} cache ({} entries):", entries.len());
        for (i, (key, value)) in entries.iter().enumerate() {
            let preview: String = value.chars().take(VIEW_PREVIEW_CHARS).collect();
            let ellipsis = if value.chars().count() > VIEW_PREVIEW_CHARS { "..." } else { "" };
            let _ = writeln!(out, "  {}. {key}: {preview}{ellipsis}", i + 1);
        }
    }
    out
}

pub fn render_stats(stats: &[NamespaceStats]) -> String {
    let mut out = String::new();
    for s in stats {
        let _ = writeln!(out, "{} cache: {} entries", s.namespace, s.entries);
        let _ = writeln!(out, "  Size: {:.2} KB", s.bytes as f64 / 1024.0);
        if let Some(last) = &s.last_updated {
            let _ = writeln!(out, "  Last updated: {last}");
        }
    }
    out
}
