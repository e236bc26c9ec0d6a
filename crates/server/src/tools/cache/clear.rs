//! cache_clear tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rocky_client::Assistant;
use rocky_core::CacheScope;

use crate::tools::json_result;

/// Parameters for the cache_clear tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearParams {
    #[serde(default)]
    pub scope: CacheScope,
}

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    pub scope: CacheScope,
    pub namespaces: Vec<String>,
    /// False when a delete failed; details are in the server log.
    pub cleared: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(assistant: &Assistant, params: CacheClearParams) -> Result<CallToolResult, McpError> {
    let cleared = assistant.clear_cache(params.scope).await;
    let namespaces = params.scope.namespaces().iter().map(ToString::to_string).collect();
    json_result(&CacheClearOutput { scope: params.scope, namespaces, cleared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{assistant, output};
    use rocky_core::Namespace;

    #[tokio::test]
    async fn test_clear_embedding_leaves_responses() {
        let assistant = assistant(&["a"]).await;
        assistant.cache().put(Namespace::Responses, "digest", "{}").await;

        let result = clear_impl(&assistant, CacheClearParams { scope: CacheScope::Embedding }).await.unwrap();
        let output: CacheClearOutput = output(&result);

        assert!(output.cleared);
        assert_eq!(output.namespaces, vec!["freshness", "documents"]);
        assert!(assistant.cache().load(Namespace::Documents).await.is_empty());
        assert_eq!(assistant.cache().load(Namespace::Responses).await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let assistant = assistant(&["a"]).await;
        let result = clear_impl(&assistant, CacheClearParams::default()).await.unwrap();

        let output: CacheClearOutput = output(&result);
        assert_eq!(output.scope, CacheScope::All);
        for namespace in Namespace::ALL {
            assert!(assistant.cache().load(namespace).await.is_empty());
        }
    }
}
