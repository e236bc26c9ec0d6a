//! cache_view tool implementation.
//!
//! Lists cached keys per namespace with a short preview of each value.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rocky_client::Assistant;
use rocky_core::CacheScope;

use crate::tools::json_result;

const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Parameters for the cache_view tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheViewParams {
    #[serde(default)]
    pub scope: CacheScope,

    /// Maximum characters shown per value (default 200).
    #[serde(default)]
    pub preview_chars: Option<usize>,
}

/// One cached entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntryView {
    pub key: String,
    pub preview: String,
    pub bytes: usize,
}

/// Output from the cache_view tool, keyed by namespace name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheViewOutput {
    pub namespaces: BTreeMap<String, Vec<CacheEntryView>>,
}

fn preview(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// Implementation of the cache_view tool.
pub async fn view_impl(assistant: &Assistant, params: CacheViewParams) -> Result<CallToolResult, McpError> {
    let max_chars = params.preview_chars.unwrap_or(DEFAULT_PREVIEW_CHARS);

    let namespaces = assistant
        .cache_entries(params.scope)
        .await
        .into_iter()
        .map(|(namespace, entries)| {
            let views = entries
                .into_iter()
                .map(|(key, value)| CacheEntryView { preview: preview(&value, max_chars), bytes: value.len(), key })
                .collect();
            (namespace.to_string(), views)
        })
        .collect();

    json_result(&CacheViewOutput { namespaces })
}
