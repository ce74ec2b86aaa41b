//! Agent execution orchestrator.
//!
//! One orchestrator serves one agent node. A run resolves the system prompt,
//! builds the agent for that run, then calls it once per output (one output
//! in single mode, one per batch variable in batch mode), recording every
//! prompt and batch value it used.

use std::sync::Arc;

use nodeflow_core::{
    context::GraphState,
    error::FlowError,
    message::{ChatMessage, ChatRole},
    state::{FlowState, StateTransition},
};
use nodeflow_tools::ToolLoader;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    assembler::ToolAssembler,
    error::{AgentError, Result},
    knowledge::{
        KnowledgeReference, KnowledgeRetrieverFactory, KnowledgeStore, RetrievalBackend,
    },
    model::{ExecutorType, ModelRegistry, select_operator_model},
    params::{BatchItem, ExecutionMode, NodeParams, OrchestratorSettings, SINGLE_OUTPUT_KEY},
    runtime::{
        AgentConfig, AgentInvocation, AgentRuntime, AgentRuntimeFactory, CallbackManager,
        NodeCallback,
    },
    template::{PromptTemplate, VariableMap},
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    #[default]
    Uninitialized,
    AgentReady,
    PromptsResolved,
    Invoked,
    ResultExtracted,
    Completed,
    Failed,
}

impl FlowState for ExecutionPhase {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(&self, target: &Self) -> bool {
        use ExecutionPhase::*;
        matches!(
            (self, target),
            (_, Failed)
                | (Uninitialized, AgentReady)
                | (AgentReady | ResultExtracted, PromptsResolved)
                | (PromptsResolved, Invoked)
                | (Invoked, ResultExtracted)
                | (ResultExtracted, Completed)
        )
    }
}

/// Prompts and batch values a run consumed, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionLog {
    pub system_prompt: Vec<String>,
    pub user_prompt: Vec<String>,
    pub batch_variable: Vec<Value>,
    #[serde(skip)]
    phase: ExecutionPhase,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    fn advance(&mut self, next: ExecutionPhase) -> Result<()> {
        let transition = StateTransition::new(self.phase, next);
        if !transition.is_valid() {
            return Err(FlowError::invalid_transition(self.phase, next).into());
        }
        debug!(from = ?self.phase, to = ?next, "Execution phase transition");
        self.phase = next;
        Ok(())
    }

    fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = ExecutionPhase::Failed;
        }
    }
}

/// Outputs of a run plus its audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// `(output_key, text)` in production order
    pub outputs: Vec<(String, String)>,
    pub log: ExecutionLog,
}

impl ExecutionResult {
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn outputs_json(&self) -> Value {
        let map: Map<String, Value> = self
            .outputs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    /// Audit record for display and replay. `batch_variable` is present
    /// only when batch values were consumed.
    pub fn log(&self) -> Value {
        let mut record = json!({
            "system_prompt": self.log.system_prompt,
            "user_prompt": self.log.user_prompt,
            "output": self.outputs_json(),
        });
        if !self.log.batch_variable.is_empty()
            && let Some(obj) = record.as_object_mut()
        {
            obj.insert(
                "batch_variable".to_string(),
                Value::Array(self.log.batch_variable.clone()),
            );
        }
        record
    }
}

/// Collaborators an orchestrator works with.
#[derive(Clone)]
pub struct AgentDeps {
    pub models: Arc<dyn ModelRegistry>,
    pub assembler: ToolAssembler,
    pub runtimes: Arc<dyn AgentRuntimeFactory>,
    pub callbacks: Option<Arc<dyn CallbackManager>>,
    pub settings: OrchestratorSettings,
}

impl AgentDeps {
    pub fn new(
        models: Arc<dyn ModelRegistry>,
        loader: Arc<dyn ToolLoader>,
        knowledge: Arc<dyn KnowledgeStore>,
        backend: Arc<dyn RetrievalBackend>,
        runtimes: Arc<dyn AgentRuntimeFactory>,
        settings: OrchestratorSettings,
    ) -> Self {
        let retrievers = KnowledgeRetrieverFactory::new(knowledge, backend, settings.clone());
        Self {
            models,
            assembler: ToolAssembler::new(loader, retrievers),
            runtimes,
            callbacks: None,
            settings,
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackManager>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

/// A built agent and the convention used to call it.
struct ReadyAgent {
    runtime: Arc<dyn AgentRuntime>,
    executor_type: ExecutorType,
}

/// Runs an agent node.
pub struct AgentOrchestrator {
    node_id: String,
    params: NodeParams,
    system_template: PromptTemplate,
    user_template: PromptTemplate,
    batch: Vec<BatchItem>,
    batch_sentinel: String,
    deps: AgentDeps,
}

impl AgentOrchestrator {
    /// Parse the prompts and validate the batch layout. The agent itself is
    /// built by each run, once its system prompt is known.
    pub fn new(node_id: impl Into<String>, params: NodeParams, deps: AgentDeps) -> Result<Self> {
        let node_id = node_id.into();
        let wrap = |e: AgentError| e.in_node(node_id.as_str());

        let system_template =
            PromptTemplate::parse(params.system_prompt.as_str()).map_err(wrap)?;
        let user_template = PromptTemplate::parse(params.user_prompt.as_str()).map_err(wrap)?;
        let batch = match params.mode() {
            ExecutionMode::Single => Vec::new(),
            ExecutionMode::Batch => params.batch_items().map_err(wrap)?,
        };

        Ok(Self {
            batch_sentinel: format!("{node_id}.batch_variable"),
            node_id,
            params,
            system_template,
            user_template,
            batch,
            deps,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    /// Reference that stands for the current batch item in prompts.
    pub fn batch_sentinel(&self) -> &str {
        &self.batch_sentinel
    }

    /// Execute the node once against `state`.
    #[instrument(skip_all, fields(node_id = %self.node_id, execution_id = %execution_id))]
    pub async fn run(
        &self,
        state: &mut dyn GraphState,
        execution_id: &str,
    ) -> Result<ExecutionResult> {
        let mut log = ExecutionLog::new();
        match self.execute(state, execution_id, &mut log).await {
            Ok(outputs) => {
                info!(outputs = outputs.len(), "Agent node completed");
                Ok(ExecutionResult { outputs, log })
            }
            Err(e) => {
                log.fail();
                error!(phase = ?log.phase(), category = e.category(), "Agent node failed: {e}");
                Err(e.in_node(self.node_id.as_str()))
            }
        }
    }

    async fn execute(
        &self,
        state: &mut dyn GraphState,
        execution_id: &str,
        log: &mut ExecutionLog,
    ) -> Result<Vec<(String, String)>> {
        // The batch sentinel, if referenced here, goes through normal lookup.
        let values = resolve(self.system_template.variables(), &*state)?;
        let system_prompt = self.system_template.render(&values)?;
        log.system_prompt.push(system_prompt.clone());

        // Built exactly once per run and dropped with it, so file tools and
        // the system prompt always match this run's state.
        let agent = self.build_agent(&*state, system_prompt).await?;
        log.advance(ExecutionPhase::AgentReady)?;

        let mut outputs = Vec::new();
        match self.params.mode() {
            ExecutionMode::Single => {
                let text = self
                    .run_once(&agent, &*state, None, execution_id, SINGLE_OUTPUT_KEY, log)
                    .await?;
                outputs.push((SINGLE_OUTPUT_KEY.to_string(), text));
            }
            ExecutionMode::Batch => {
                for item in &self.batch {
                    let text = self
                        .run_once(
                            &agent,
                            &*state,
                            Some(&item.input_ref),
                            execution_id,
                            &item.output_key,
                            log,
                        )
                        .await?;
                    outputs.push((item.output_key.clone(), text));
                }
            }
        }

        if self.params.output_user {
            for (output_key, text) in &outputs {
                debug!(output_key = %output_key, "Recording answer in chat history");
                state.append_turn(text, ChatRole::Assistant)?;
            }
        }

        log.advance(ExecutionPhase::Completed)?;
        Ok(outputs)
    }

    async fn build_agent(
        &self,
        state: &dyn GraphState,
        system_prompt: String,
    ) -> Result<ReadyAgent> {
        let models = self.deps.models.operator_models().await?;
        let selected = select_operator_model(&models, &self.params.model_id)?;
        let llm = self
            .deps
            .models
            .get_llm(&self.params.model_id, self.params.temperature)
            .await?;

        let references = KnowledgeReference::from_selection(&self.params.knowledge_id);
        let tools = self
            .deps
            .assembler
            .build_all(
                &self.params.tool_ids(),
                &references,
                &llm,
                &selected.retrieval_config(),
                state,
            )
            .await?;

        let config = AgentConfig {
            executor_type: selected.agent_executor_type,
            tools,
            llm,
            system_prompt,
        };
        info!(
            model_id = %self.params.model_id,
            executor_type = %config.executor_type,
            tools = ?config.tool_names(),
            "Building agent"
        );

        let runtime = self.deps.runtimes.build(config).await?;
        Ok(ReadyAgent {
            runtime,
            executor_type: selected.agent_executor_type,
        })
    }

    /// Produce one output. `input_ref` is the batch variable feeding this
    /// output, `None` in single mode.
    async fn run_once(
        &self,
        agent: &ReadyAgent,
        state: &dyn GraphState,
        input_ref: Option<&str>,
        execution_id: &str,
        output_key: &str,
        log: &mut ExecutionLog,
    ) -> Result<String> {
        let mut values = VariableMap::new();
        for reference in self.user_template.variables() {
            let value = match input_ref {
                Some(input) if *reference == self.batch_sentinel => {
                    let value = state.get_variable(input)?;
                    log.batch_variable.push(value.clone());
                    value
                }
                _ => state.get_variable(reference)?,
            };
            values.insert(reference.clone(), value);
        }
        let user_prompt = self.user_template.render(&values)?;
        log.user_prompt.push(user_prompt.clone());
        log.advance(ExecutionPhase::PromptsResolved)?;

        let history = if self.params.chat_history_flag.flag {
            let depth = self
                .params
                .chat_history_flag
                .value
                .min(self.deps.settings.max_history);
            state.history(depth)
        } else {
            Vec::new()
        };

        let invocation = match agent.executor_type {
            ExecutorType::ReAct => AgentInvocation::ReAct {
                input: user_prompt,
                chat_history: history,
            },
            ExecutorType::FunctionCall => {
                let mut messages = history;
                messages.push(ChatMessage::user(user_prompt));
                AgentInvocation::Chat { messages }
            }
        };

        let callback = NodeCallback::new(
            execution_id,
            self.node_id.as_str(),
            output_key,
            self.params.output_user,
        )
        .with_manager(self.deps.callbacks.clone());

        debug!(output_key = %output_key, executor_type = %agent.executor_type, "Invoking agent");
        let messages = agent
            .runtime
            .invoke(invocation, &callback)
            .await
            .map_err(|e| match e {
                AgentError::Invocation(_) => e,
                other => AgentError::invocation(other.to_string()),
            })?;
        log.advance(ExecutionPhase::Invoked)?;

        let Some(last) = messages.last() else {
            warn!(output_key = %output_key, "Agent returned no messages");
            return Err(AgentError::empty_result(output_key));
        };
        log.advance(ExecutionPhase::ResultExtracted)?;
        Ok(last.content.clone())
    }
}

impl std::fmt::Debug for AgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOrchestrator")
            .field("node_id", &self.node_id)
            .field("mode", &self.params.mode())
            .field("outputs", &self.batch.len().max(1))
            .finish_non_exhaustive()
    }
}

fn resolve(references: &[String], state: &dyn GraphState) -> Result<VariableMap> {
    references
        .iter()
        .map(|reference| -> Result<(String, Value)> {
            Ok((reference.clone(), state.get_variable(reference)?))
        })
        .collect()
}
