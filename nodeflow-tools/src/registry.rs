use std::{collections::HashMap, sync::Arc};

use nodeflow_core::llm::LlmRef;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    core::{Tool, ToolContext, ToolInfo, ToolParameters, ToolResult},
    error::{Result, ToolError},
};

/// Builds a tool bound to the language model of the calling agent.
pub type ToolFactory = Arc<dyn Fn(&LlmRef) -> Result<Arc<dyn Tool>> + Send + Sync>;

/// Tool registry keyed by the tool identifier used in node configuration
#[derive(Clone, Default)]
pub struct ToolRegistry {
    factories: Arc<RwLock<HashMap<String, ToolFactory>>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory producing a fresh tool per model
    pub async fn register_factory<F>(&self, tool_id: impl Into<String>, factory: F)
    where
        F: Fn(&LlmRef) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        let tool_id = tool_id.into();
        debug!(tool_id = %tool_id, "Registering tool factory");
        let mut factories = self.factories.write().await;
        factories.insert(tool_id, Arc::new(factory));
    }

    /// Register an already built tool that ignores the model
    pub async fn register_tool(&self, tool_id: impl Into<String>, tool: Arc<dyn Tool>) {
        self.register_factory(tool_id, move |_llm: &LlmRef| Ok(Arc::clone(&tool)))
            .await;
    }

    /// Build the tool registered under `tool_id` for the given model
    pub async fn instantiate(&self, tool_id: &str, llm: &LlmRef) -> Result<Arc<dyn Tool>> {
        let factory = {
            let factories = self.factories.read().await;
            factories
                .get(tool_id)
                .cloned()
                .ok_or_else(|| ToolError::not_found(tool_id))?
        };
        factory(llm)
    }

    /// Execute a tool by identifier, validating parameters first
    pub async fn execute_tool(
        &self,
        tool_id: &str,
        llm: &LlmRef,
        parameters: &Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let tool = self.instantiate(tool_id, llm).await?;

        let tool_params = ToolParameters::new(parameters.clone());
        if let Err(e) = tool.validate_parameters(&tool_params).await {
            return Err(ToolError::invalid_parameters(e.to_string()));
        }

        tool.execute(tool_params, context.clone()).await
    }

    /// Describe every registered tool as built for `llm`
    pub async fn describe_all(&self, llm: &LlmRef) -> Result<Vec<ToolInfo>> {
        let mut ids = self.list_tools().await;
        ids.sort();

        let mut infos = Vec::with_capacity(ids.len());
        for id in ids {
            let tool = self.instantiate(&id, llm).await?;
            infos.push(ToolInfo::new(tool.as_ref()));
        }
        Ok(infos)
    }

    /// List all tool identifiers
    pub async fn list_tools(&self) -> Vec<String> {
        let factories = self.factories.read().await;
        factories.keys().cloned().collect()
    }

    /// Check whether a tool identifier is registered
    pub async fn contains(&self, tool_id: &str) -> bool {
        let factories = self.factories.read().await;
        factories.contains_key(tool_id)
    }

    /// Remove a tool from the registry
    pub async fn unregister(&self, tool_id: &str) -> Result<()> {
        let mut factories = self.factories.write().await;
        factories
            .remove(tool_id)
            .map(|_| ())
            .ok_or_else(|| ToolError::not_found(tool_id))
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let factories = self.factories.read().await;
        RegistryStats {
            total_tools: factories.len(),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").finish_non_exhaustive()
    }
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_tools: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{core::ToolCategory, retrieval::tests::StubModel};

    /// Echo tool that remembers the model it was built for
    #[derive(Debug)]
    pub(crate) struct EchoTool {
        pub name: String,
        pub model: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn category(&self) -> ToolCategory {
            ToolCategory::Function
        }

        fn parameter_schema(&self) -> Value {
            ToolParameters::new_schema()
                .add_required("text", "string", "Text to echo")
                .into()
        }

        async fn execute(
            &self,
            parameters: ToolParameters,
            _context: ToolContext,
        ) -> Result<ToolResult> {
            let text = parameters.get_string("text")?;
            Ok(ToolResult::success(format!("{}:{text}", self.model)))
        }
    }

    pub(crate) async fn echo_registry(ids: &[&str]) -> ToolRegistry {
        let registry = ToolRegistry::new();
        for id in ids {
            let name = format!("echo_{id}");
            registry
                .register_factory(*id, move |llm: &LlmRef| {
                    Ok(Arc::new(EchoTool {
                        name: name.clone(),
                        model: llm.model_id().to_string(),
                    }) as Arc<dyn Tool>)
                })
                .await;
        }
        registry
    }

    #[tokio::test]
    async fn test_instantiate_binds_model() {
        let registry = echo_registry(&["1"]).await;
        let llm: LlmRef = Arc::new(StubModel);

        let tool = registry.instantiate("1", &llm).await.unwrap();
        assert_eq!(tool.name(), "echo_1");

        let result = registry
            .execute_tool("1", &llm, &json!({"text": "hi"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(result.content, "stub:hi");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let llm: LlmRef = Arc::new(StubModel);

        let err = registry.instantiate("42", &llm).await.err().unwrap();
        assert!(matches!(err, ToolError::NotFound(id) if id == "42"));
        assert!(registry.unregister("42").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected() {
        let registry = echo_registry(&["1"]).await;
        let llm: LlmRef = Arc::new(StubModel);

        let err = registry
            .execute_tool("1", &llm, &json!({}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_describe_and_stats() {
        let registry = echo_registry(&["2", "1"]).await;
        let llm: LlmRef = Arc::new(StubModel);

        let names: Vec<String> = registry
            .describe_all(&llm)
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(names, vec!["echo_1", "echo_2"]);
        assert_eq!(registry.stats().await.total_tools, 2);
        assert!(registry.contains("2").await);
    }
}
