//! `rocky ask`: one-shot or interactive question answering.

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use rocky_client::Assistant;
use rocky_core::AppConfig;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question to answer. Omit for an interactive session.
    #[arg(short, long)]
    pub question: Option<String>,

    /// Rebuild the document index before answering.
    #[arg(long)]
    pub reload: bool,
}

pub async fn run(config: &AppConfig, args: AskArgs) -> Result<()> {
    let assistant = Assistant::open(config, args.reload).await.context("failed to open assistant")?;

    if let Some(question) = args.question {
        println!("{}", assistant.ask(&question).await?);
        return Ok(());
    }

    interactive(&assistant).await
}

/// Whether `input` ends the interactive session.
pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "exit" | "quit" | "q")
}

async fn interactive(assistant: &Assistant) -> Result<()> {
    println!("Entering interactive mode. Type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nEnter your question: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let answer = assistant.ask(&line).await?;
        println!("\nrocky: {answer}");
    }

    Ok(())
}
