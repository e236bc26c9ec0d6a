//! Source id resolution from the exported page list.
//!
//! The page list is a CSV export with `title,url` rows. A row contributes an
//! id when its URL carries a 32-hex-digit page id followed by `?pvs=4`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use rocky_core::{AppConfig, Error};

static PAGE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-f0-9]{32})\?pvs=4").unwrap());

/// Every page id in `contents`, in file order.
pub fn extract_page_ids(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| PAGE_ID.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Read the page list at `path` and keep the first `max_sources` ids.
pub async fn load_page_ids(path: &Path, max_sources: usize) -> Result<Vec<String>, Error> {
    let contents = tokio::fs::read_to_string(path).await?;
    let mut ids = extract_page_ids(&contents);
    ids.truncate(max_sources);
    tracing::info!(path = %path.display(), ids = ids.len(), "loaded page ids");
    Ok(ids)
}

/// Configured source ids, falling back to the page list when none are set.
pub async fn resolve_source_ids(config: &AppConfig) -> Result<Vec<String>, Error> {
    if !config.source_ids.is_empty() {
        let mut ids = config.source_ids.clone();
        ids.truncate(config.max_sources);
        return Ok(ids);
    }
    load_page_ids(&config.pages_file, config.max_sources).await
}
