//! # nodeflow-agent
//!
//! Agent execution node for nodeflow workflows.
//!
//! An agent node renders its prompts from workflow state, builds an agent
//! once (model, function tools and knowledge retrieval tools), then calls it
//! for a single output or for every item of a batch. Everything it consumed
//! is recorded in an audit log.
//!
//! ## Quick Start
//!
//! ```rust
//! use nodeflow_agent::prelude::*;
//! use serde_json::json;
//!
//! let params = NodeParams::from_value(json!({
//!     "model_id": 1,
//!     "system_prompt": "You are {start_1.role}",
//!     "user_prompt": "Answer: {start_1.question}",
//!     "tab": {"value": "single"},
//! }))
//! .unwrap();
//!
//! assert_eq!(params.model_id, "1");
//! assert_eq!(params.mode(), ExecutionMode::Single);
//!
//! let template = PromptTemplate::parse(params.user_prompt.as_str()).unwrap();
//! assert_eq!(template.variables(), &["start_1.question"]);
//! ```

pub mod agent_node;
pub mod assembler;
pub mod error;
pub mod genai_model;
pub mod knowledge;
pub mod model;
pub mod orchestrator;
pub mod params;
pub mod runtime;
pub mod template;

#[cfg(test)]
mod testing;

pub use agent_node::*;
pub use assembler::*;
pub use error::*;
pub use genai_model::GenaiModel;
pub use knowledge::*;
pub use model::*;
pub use orchestrator::*;
pub use params::*;
pub use runtime::*;
pub use template::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use nodeflow_core::prelude::*;

    pub use crate::{
        agent_node::AgentNode,
        assembler::ToolAssembler,
        error::{AgentError, Result},
        genai_model::GenaiModel,
        knowledge::{
            KnowledgeReference, KnowledgeRetrieverFactory, KnowledgeStore, RetrievalBackend,
        },
        model::{ExecutorType, ModelRegistry, OperatorModel},
        orchestrator::{
            AgentDeps, AgentOrchestrator, ExecutionLog, ExecutionPhase, ExecutionResult,
        },
        params::{ExecutionMode, NodeParams, OrchestratorSettings},
        runtime::{
            AgentConfig, AgentInvocation, AgentRuntime, AgentRuntimeFactory, CallbackManager,
            NodeCallback, StreamEvent, StreamEventKind,
        },
        template::PromptTemplate,
    };
}
