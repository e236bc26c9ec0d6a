//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rocky_client::Assistant;
use rocky_core::{CacheScope, NamespaceStats};

use crate::tools::json_result;

/// Parameters for the cache_stats tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsParams {
    #[serde(default)]
    pub scope: CacheScope,
}

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    pub collection: String,
    pub namespaces: Vec<NamespaceStats>,
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(assistant: &Assistant, params: CacheStatsParams) -> Result<CallToolResult, McpError> {
    let namespaces = assistant.cache_stats(params.scope).await?;
    json_result(&CacheStatsOutput { collection: assistant.cache().collection().to_string(), namespaces })
}
