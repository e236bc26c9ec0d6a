//! rocky command-line entry point.
//!
//! Logs go to stderr; answers and cache reports go to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rocky_core::AppConfig;

mod commands;

use commands::ask::AskArgs;
use commands::cache::CacheArgs;

/// Ask questions about the company's Notion workspace.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cache database path (overrides ROCKY_DB_PATH).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or clear the local cache.
    Cache(CacheArgs),
    /// Ask a question, or start an interactive session without --question.
    Ask(AskArgs),
    /// Rebuild the document index from Notion.
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    match cli.command {
        Command::Cache(args) => commands::cache::run(&config, args).await,
        Command::Ask(args) => commands::ask::run(&config, args).await,
        Command::Reload => commands::reload(&config).await,
    }
}
