//! reload_documents tool implementation.
//!
//! Forces a rebuild of the document snapshot from Notion.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rocky_client::Assistant;

use super::json_result;

/// Parameters for the reload_documents tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReloadParams {
    /// Also drop memoized answers, which may cite the old documents.
    #[serde(default)]
    pub clear_answers: bool,
}

/// Output from the reload_documents tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReloadOutput {
    pub documents: usize,
    /// Source items that could not be fetched.
    pub failed: Vec<String>,
    pub answers_cleared: bool,
}

/// Implementation of the reload_documents tool.
pub async fn reload_impl(assistant: &Assistant, params: ReloadParams) -> Result<CallToolResult, McpError> {
    let outcome = assistant.reload().await;
    let failed = outcome
        .snapshot
        .documents
        .iter()
        .filter(|d| d.is_placeholder())
        .map(|d| d.id.clone())
        .collect();

    let answers_cleared = params.clear_answers && assistant.clear_cache(rocky_core::CacheScope::Response).await;

    json_result(&ReloadOutput { documents: outcome.snapshot.len(), failed, answers_cleared })
}
