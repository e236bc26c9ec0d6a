//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use rocky_client::Assistant;

use crate::tools::ask::{AskParams, ask_impl};
use crate::tools::cache::{CacheClearParams, CacheStatsParams, CacheViewParams, clear_impl, stats_impl, view_impl};
use crate::tools::reload::{ReloadParams, reload_impl};

/// The main MCP server handler for rocky.
#[derive(Clone)]
pub struct RockyServer {
    assistant: Arc<Assistant>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl RockyServer {
    /// Create a new server handler around an opened assistant.
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Answer a question about the Rockfeather workspace from the indexed Notion pages. Repeated questions are served from the answer cache."
    )]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        ask_impl(&self.assistant, params.0).await
    }

    #[tool(description = "Force a rebuild of the document index from Notion. Reports pages that could not be fetched.")]
    async fn reload_documents(&self, params: Parameters<ReloadParams>) -> Result<CallToolResult, McpError> {
        reload_impl(&self.assistant, params.0).await
    }

    #[tool(description = "Entry counts, stored bytes and last write time per cache namespace.")]
    async fn cache_stats(&self, params: Parameters<CacheStatsParams>) -> Result<CallToolResult, McpError> {
        stats_impl(&self.assistant, params.0).await
    }

    #[tool(description = "List cached keys with value previews. Scope: all, response, embedding, freshness, documents.")]
    async fn cache_view(&self, params: Parameters<CacheViewParams>) -> Result<CallToolResult, McpError> {
        view_impl(&self.assistant, params.0).await
    }

    #[tool(
        description = "Clear cached answers (response), the document index (embedding) or everything (all). The next question or reload repopulates it."
    )]
    async fn cache_clear(&self, params: Parameters<CacheClearParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.assistant, params.0).await
    }
}

impl ServerHandler for RockyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "rocky".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Ask questions about the company's Notion workspace with the `ask` tool.".into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
