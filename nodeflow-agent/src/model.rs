//! Model registry contract: which chat models agents may use, and how.

use std::fmt;

use async_trait::async_trait;
use nodeflow_core::llm::LlmRef;
use nodeflow_tools::RetrievalConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Calling convention of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutorType {
    /// Reasoning loop fed with one input string plus chat history
    #[default]
    #[serde(rename = "ReAct")]
    ReAct,
    /// Native tool calling over a chat message sequence
    #[serde(rename = "function call")]
    FunctionCall,
}

impl fmt::Display for ExecutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReAct => write!(f, "ReAct"),
            Self::FunctionCall => write!(f, "function call"),
        }
    }
}

/// A model the operator enabled for agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorModel {
    pub model_id: String,
    pub agent_executor_type: ExecutorType,
    pub knowledge_max_content: usize,
    #[serde(default)]
    pub knowledge_sort_index: bool,
}

impl OperatorModel {
    pub fn new(model_id: impl Into<String>, agent_executor_type: ExecutorType) -> Self {
        let retrieval = RetrievalConfig::default();
        Self {
            model_id: model_id.into(),
            agent_executor_type,
            knowledge_max_content: retrieval.max_content,
            knowledge_sort_index: retrieval.sort_by_source_and_index,
        }
    }

    pub fn with_knowledge_limits(mut self, max_content: usize, sort_index: bool) -> Self {
        self.knowledge_max_content = max_content;
        self.knowledge_sort_index = sort_index;
        self
    }

    /// Retrieval options every knowledge tool built for this model uses.
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig::new(self.knowledge_max_content, self.knowledge_sort_index)
    }
}

/// Source of models and their operator profiles.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Models the operator enabled for agents, in configured order.
    async fn operator_models(&self) -> Result<Vec<OperatorModel>>;

    /// Build a chat model handle.
    async fn get_llm(&self, model_id: &str, temperature: f32) -> Result<LlmRef>;
}

/// Find the operator profile of `model_id`.
pub fn select_operator_model(models: &[OperatorModel], model_id: &str) -> Result<OperatorModel> {
    if models.is_empty() {
        return Err(AgentError::configuration(
            "operator model list for agents is empty",
        ));
    }
    models
        .iter()
        .find(|m| m.model_id == model_id)
        .cloned()
        .ok_or_else(|| {
            AgentError::configuration(format!(
                "model {model_id} is not in the operator model list for agents"
            ))
        })
}
