//! Contract between the orchestrator and the agent loop that runs the model.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeflow_core::{llm::LlmRef, message::ChatMessage};
use nodeflow_tools::Tool;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::Result, model::ExecutorType};

/// Everything needed to build an agent.
#[derive(Clone)]
pub struct AgentConfig {
    pub executor_type: ExecutorType,
    pub tools: Vec<Arc<dyn Tool>>,
    pub llm: LlmRef,
    pub system_prompt: String,
}

impl AgentConfig {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("executor_type", &self.executor_type)
            .field("tools", &self.tool_names())
            .field("llm", &self.llm.model_id())
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Input for one agent call, shaped by the calling convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentInvocation {
    /// Reasoning loop: the rendered prompt plus prior turns
    #[serde(rename = "react")]
    ReAct {
        input: String,
        chat_history: Vec<ChatMessage>,
    },
    /// Native tool calling: prior turns followed by the user message
    Chat { messages: Vec<ChatMessage> },
}

/// A built agent.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run the agent to completion and return the messages it produced.
    async fn invoke(
        &self,
        invocation: AgentInvocation,
        callback: &NodeCallback,
    ) -> Result<Vec<ChatMessage>>;
}

/// Builds agents from their configuration.
#[async_trait]
pub trait AgentRuntimeFactory: Send + Sync {
    async fn build(&self, config: AgentConfig) -> Result<Arc<dyn AgentRuntime>>;
}

/// Progress reported while an agent runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Partial answer text
    Token { content: String },
    /// The agent called a tool
    ToolStart {
        tool: String,
        input: serde_json::Value,
    },
    /// A tool returned
    ToolEnd { tool: String, output: String },
    /// The final answer for the output key
    Final { content: String },
}

/// A progress event bound to the node output that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub execution_id: String,
    pub node_id: String,
    pub output_key: String,
    pub kind: StreamEventKind,
    pub timestamp: DateTime<Utc>,
}

/// Transport delivering events to the client watching the workflow.
#[async_trait]
pub trait CallbackManager: Send + Sync {
    async fn send(&self, event: StreamEvent);
}

/// Callback handed to the agent for one output.
#[derive(Clone)]
pub struct NodeCallback {
    pub execution_id: String,
    pub node_id: String,
    pub output_key: String,
    /// Whether partial answers are streamed to the end user
    pub output_to_user: bool,
    manager: Option<Arc<dyn CallbackManager>>,
}

impl NodeCallback {
    pub fn new(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        output_key: impl Into<String>,
        output_to_user: bool,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            output_key: output_key.into(),
            output_to_user,
            manager: None,
        }
    }

    pub fn with_manager(mut self, manager: Option<Arc<dyn CallbackManager>>) -> Self {
        self.manager = manager;
        self
    }

    /// Forward an event. Answer tokens are dropped unless the node
    /// streams to the user.
    pub async fn emit(&self, kind: StreamEventKind) {
        if matches!(kind, StreamEventKind::Token { .. }) && !self.output_to_user {
            return;
        }
        let Some(manager) = &self.manager else {
            return;
        };

        debug!(
            execution_id = %self.execution_id,
            node_id = %self.node_id,
            output_key = %self.output_key,
            "Forwarding agent event"
        );
        manager
            .send(StreamEvent {
                execution_id: self.execution_id.clone(),
                node_id: self.node_id.clone(),
                output_key: self.output_key.clone(),
                kind,
                timestamp: Utc::now(),
            })
            .await;
    }
}

impl fmt::Debug for NodeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCallback")
            .field("execution_id", &self.execution_id)
            .field("node_id", &self.node_id)
            .field("output_key", &self.output_key)
            .field("output_to_user", &self.output_to_user)
            .field("has_manager", &self.manager.is_some())
            .finish()
    }
}
