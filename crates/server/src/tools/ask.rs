//! ask tool implementation.
//!
//! Answers a question from the indexed documents, serving memoized answers
//! when the same question was asked before.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rocky_client::Assistant;
use rocky_core::answers::is_apology;

use super::json_result;

/// Parameters for the ask tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// The question to answer.
    pub question: String,
}

/// Output from the ask tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskOutput {
    pub answer: String,
    /// True when the answer is an apology for a failed query.
    pub failed: bool,
}

/// Implementation of the ask tool.
pub async fn ask_impl(assistant: &Assistant, params: AskParams) -> Result<CallToolResult, McpError> {
    let answer = assistant.ask(&params.question).await?;
    let output = AskOutput { failed: is_apology(&answer), answer };
    json_result(&output)
}
