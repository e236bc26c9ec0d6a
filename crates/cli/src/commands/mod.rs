//! Subcommand implementations.

pub mod ask;
pub mod cache;

use anyhow::{Context, Result};

use rocky_client::Assistant;
use rocky_core::AppConfig;

/// Force a rebuild and report what was fetched.
pub async fn reload(config: &AppConfig) -> Result<()> {
    let assistant = Assistant::open(config, true).await.context("failed to rebuild documents")?;
    let snapshot = assistant.documents().await;

    println!(
        "Reloaded {} documents from {} pages ({} failed).",
        snapshot.len(),
        assistant.source_ids().len(),
        snapshot.placeholder_count()
    );
    for document in snapshot.documents.iter().filter(|d| d.is_placeholder()) {
        println!("  {}: {}", document.id, document.fetch_error.as_deref().unwrap_or("unknown error"));
    }
    Ok(())
}
