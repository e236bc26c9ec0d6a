//! Notion API document source.
//!
//! ### API contract
//!
//! - **Endpoint**: `GET {base}/blocks/{id}/children?page_size=100`,
//!   following `next_cursor` while `has_more` is set.
//! - **Authentication**: `Authorization: Bearer <token>` plus the
//!   `Notion-Version` header.
//! - **Nesting**: children of blocks with `has_children` are fetched
//!   depth-first, up to [`NotionConfig::max_depth`] levels below the page.
//! - **Errors**: network failures, timeouts, 429 and 5xx are transient;
//!   everything else (including a missing token) is not worth retrying.
//!
//! One page becomes one [`Document`] whose text is the rendered blocks
//! joined by newlines.

pub mod blocks;
pub mod error;

pub use blocks::{Block, BlockError, BlockKind};
pub use error::NotionError;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;

use rocky_core::{AppConfig, Document, DocumentSource, SourceError};

const PAGE_SIZE: u32 = 100;

/// Notion API client configuration.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Integration token. Requests fail as unexpected when unset.
    pub api_key: Option<String>,
    /// Base URL (default: https://api.notion.com/v1).
    pub base_url: String,
    /// Value of the `Notion-Version` header.
    pub version: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Deepest nesting level fetched below a page.
    pub max_depth: usize,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: "rocky/0.1".to_string(),
            max_depth: 8,
        }
    }
}

impl From<&AppConfig> for NotionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.notion_api_key.clone(),
            base_url: config.notion_base_url.clone(),
            version: config.notion_version.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Notion block-children client.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self, NotionError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(NotionError::from)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &NotionConfig {
        &self.config
    }

    /// Fetch every direct child of `block_id`, following pagination.
    pub async fn list_children(&self, block_id: &str) -> Result<Vec<Value>, NotionError> {
        let api_key = self.config.api_key.as_deref().ok_or(NotionError::MissingApiKey)?;
        let url = format!("{}/blocks/{}/children", self.config.base_url.trim_end_matches('/'), block_id);

        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(api_key)
                .header("Notion-Version", &self.config.version)
                .header(header::ACCEPT, "application/json")
                .query(&[("page_size", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let response = request.send().await?;
            let status = response.status();
            tracing::debug!(block_id, status = status.as_u16(), "notion children response");

            if !status.is_success() {
                return Err(NotionError::from_status(status, block_id));
            }

            let bytes = response.bytes().await?;
            let page: ChildrenPage = serde_json::from_slice(&bytes).map_err(|e| NotionError::Parse(e.to_string()))?;
            results.extend(page.results);

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }

    /// Render a whole page to plain text.
    pub async fn page_text(&self, page_id: &str) -> Result<String, NotionError> {
        let mut lines = Vec::new();
        self.collect_lines(page_id, 0, &mut lines).await?;
        Ok(lines.join("\n"))
    }

    fn collect_lines<'a>(
        &'a self, block_id: &'a str, depth: usize, lines: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<(), NotionError>> {
        async move {
            for raw in self.list_children(block_id).await? {
                let block = match Block::parse(&raw) {
                    Ok(block) => block,
                    Err(e) => {
                        tracing::warn!(block_id, error = %e, "skipping block");
                        continue;
                    }
                };

                if let Some(line) = block.render() {
                    lines.push(line);
                }

                if block.has_children {
                    if depth + 1 > self.config.max_depth {
                        tracing::warn!(block_id = %block.id, depth, "maximum nesting depth reached; skipping children");
                        continue;
                    }
                    self.collect_lines(&block.id, depth + 1, lines).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn fetch(&self, id: &str) -> Result<Vec<Document>, SourceError> {
        let text = self.page_text(id).await?;
        let document = Document::new(id, text).with_metadata("page_id", id).with_metadata("source", "notion");
        Ok(vec![document])
    }
}
