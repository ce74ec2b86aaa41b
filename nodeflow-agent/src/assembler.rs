//! Assembles the tools handed to an agent.

use std::{collections::HashSet, sync::Arc};

use nodeflow_core::{context::GraphState, llm::LlmRef};
use nodeflow_tools::{RetrievalConfig, Tool, ToolLoader};
use tracing::{debug, info};

use crate::{
    error::{AgentError, Result},
    knowledge::{KnowledgeReference, KnowledgeRetrieverFactory},
};

/// Give every reference a distinct tool name.
///
/// Names derive from the reference alone, so repeated runs agree. When two
/// references map to the same name, later ones take the first free
/// `_2`, `_3`, ... suffix.
pub fn unique_tool_names(references: &[KnowledgeReference]) -> Vec<String> {
    let mut used = HashSet::new();
    references
        .iter()
        .map(|reference| {
            let base = reference.base_tool_name();
            let mut candidate = base.clone();
            let mut suffix = 2;
            while used.contains(&candidate) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Builds function tools and knowledge retrieval tools.
#[derive(Clone)]
pub struct ToolAssembler {
    loader: Arc<dyn ToolLoader>,
    retrievers: KnowledgeRetrieverFactory,
}

impl ToolAssembler {
    pub fn new(loader: Arc<dyn ToolLoader>, retrievers: KnowledgeRetrieverFactory) -> Self {
        Self { loader, retrievers }
    }

    pub async fn build_function_tools(
        &self,
        tool_ids: &[String],
        llm: &LlmRef,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        if tool_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = tool_ids.len(), "Loading function tools");
        Ok(self.loader.load_function_tools(tool_ids, llm).await?)
    }

    /// One retrieval tool per reference, in declared order.
    pub async fn build_knowledge_tools(
        &self,
        references: &[KnowledgeReference],
        llm: &LlmRef,
        retrieval: &RetrievalConfig,
        state: &dyn GraphState,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        let names = unique_tool_names(references);
        let mut tools = Vec::with_capacity(references.len());

        for (reference, name) in references.iter().zip(names) {
            let spec = self
                .retrievers
                .build(reference, name, state, llm, retrieval)
                .await
                .map_err(|e| match e {
                    AgentError::NotFound(message) => AgentError::not_found(format!(
                        "{message} (knowledge reference '{}')",
                        reference.key
                    )),
                    other => other,
                })?;
            tools.push(self.loader.load_retriever_tool(spec).await?);
        }

        Ok(tools)
    }

    /// Function tools first, knowledge tools appended.
    pub async fn build_all(
        &self,
        tool_ids: &[String],
        references: &[KnowledgeReference],
        llm: &LlmRef,
        retrieval: &RetrievalConfig,
        state: &dyn GraphState,
    ) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools = self.build_function_tools(tool_ids, llm).await?;
        tools.extend(
            self.build_knowledge_tools(references, llm, retrieval, state)
                .await?,
        );
        info!(
            function_tools = tool_ids.len(),
            knowledge_tools = references.len(),
            "Assembled agent tools"
        );
        Ok(tools)
    }
}

impl std::fmt::Debug for ToolAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAssembler")
            .field("retrievers", &self.retrievers)
            .finish_non_exhaustive()
    }
}
