//! Tool loading capability used by agent nodes.

use std::sync::Arc;

use async_trait::async_trait;
use nodeflow_core::llm::LlmRef;
use tracing::{debug, info};

use crate::{
    core::Tool,
    error::Result,
    registry::ToolRegistry,
    retrieval::{KnowledgeRetrievalTool, RetrieverToolSpec},
};

/// Turns declarative tool references into callable tools.
#[async_trait]
pub trait ToolLoader: Send + Sync {
    /// Instantiate the function tools named by `tool_ids`, bound to `llm`.
    async fn load_function_tools(
        &self,
        tool_ids: &[String],
        llm: &LlmRef,
    ) -> Result<Vec<Arc<dyn Tool>>>;

    /// Build a retrieval tool from its descriptor.
    async fn load_retriever_tool(&self, spec: RetrieverToolSpec) -> Result<Arc<dyn Tool>>;
}

/// In-process loader backed by a [`ToolRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryToolLoader {
    registry: ToolRegistry,
}

impl RegistryToolLoader {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[async_trait]
impl ToolLoader for RegistryToolLoader {
    async fn load_function_tools(
        &self,
        tool_ids: &[String],
        llm: &LlmRef,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools = Vec::with_capacity(tool_ids.len());
        for tool_id in tool_ids {
            let tool = self.registry.instantiate(tool_id, llm).await?;
            debug!(tool_id = %tool_id, tool = tool.name(), "Loaded function tool");
            tools.push(tool);
        }
        Ok(tools)
    }

    async fn load_retriever_tool(&self, spec: RetrieverToolSpec) -> Result<Arc<dyn Tool>> {
        info!(
            tool = %spec.name,
            collection = %spec.vector_client.params().collection_name,
            index = %spec.keyword_client.params().index_name,
            "Loaded knowledge retrieval tool"
        );
        Ok(Arc::new(KnowledgeRetrievalTool::new(spec)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio_test::assert_ok;

    use super::*;
    use crate::{
        core::ToolCategory,
        error::ToolError,
        registry::tests::echo_registry,
        retrieval::{
            RetrievalConfig,
            tests::{StubModel, spec_with},
        },
    };

    #[tokio::test]
    async fn test_load_function_tools_in_order() {
        let loader = RegistryToolLoader::new(echo_registry(&["1", "2"]).await);
        let llm: LlmRef = Arc::new(StubModel);

        let tools = loader
            .load_function_tools(&["2".to_string(), "1".to_string()], &llm)
            .await
            .unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["echo_2", "echo_1"]);

        let none = loader.load_function_tools(&[], &llm).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_load_unknown_function_tool() {
        let loader = RegistryToolLoader::default();
        let llm: LlmRef = Arc::new(StubModel);

        let err = loader
            .load_function_tools(&["9".to_string()], &llm)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_retriever_tool() {
        let loader = RegistryToolLoader::default();
        let spec = spec_with("knowledge_3", vec![], vec![], RetrievalConfig::default());

        let tool = assert_ok!(loader.load_retriever_tool(spec).await);
        assert_eq!(tool.name(), "knowledge_3");
        assert_eq!(tool.description(), "knowledge_3 docs");
        assert_eq!(tool.category(), ToolCategory::Knowledge);
    }
}
