//! MCP tool implementations.
//!
//! This module contains all tools exposed by the rocky server.

pub mod ask;
pub mod cache;
pub mod reload;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use rocky_core::Error;

/// Serialize `output` as the pretty JSON text content of a successful call.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Serialization(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
