//! In-memory collaborators shared by the unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use nodeflow_core::{
    error::Result as FlowResult,
    llm::{LanguageModel, LlmRef},
    message::ChatMessage,
};
use nodeflow_tools::{
    RegistryToolLoader, RetrieverToolSpec, Tool, ToolCategory, ToolContext, ToolLoader,
    ToolParameters, ToolRegistry, ToolResult,
};
use serde_json::Value;

use crate::{
    error::{AgentError, Result},
    model::{ModelRegistry, OperatorModel},
    runtime::{
        AgentConfig, AgentInvocation, AgentRuntime, AgentRuntimeFactory, CallbackManager,
        NodeCallback, StreamEvent, StreamEventKind,
    },
};

#[derive(Debug)]
pub(crate) struct StaticModel {
    id: String,
}

impl StaticModel {
    pub(crate) fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait]
impl LanguageModel for StaticModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> FlowResult<ChatMessage> {
        Ok(ChatMessage::assistant("ok"))
    }
}

pub(crate) struct StaticModelRegistry {
    pub models: Vec<OperatorModel>,
}

#[async_trait]
impl ModelRegistry for StaticModelRegistry {
    async fn operator_models(&self) -> Result<Vec<OperatorModel>> {
        Ok(self.models.clone())
    }

    async fn get_llm(&self, model_id: &str, _temperature: f32) -> Result<LlmRef> {
        Ok(Arc::new(StaticModel::new(model_id)))
    }
}

#[derive(Debug)]
struct EchoTool {
    name: String,
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
    ) -> nodeflow_tools::Result<ToolResult> {
        Ok(ToolResult::success(parameters.get_string("text")?))
    }
}

/// Loader resolving each id to an `echo_{id}` tool.
pub(crate) async fn echo_loader(ids: &[&str]) -> Arc<dyn ToolLoader> {
    let registry = ToolRegistry::new();
    for id in ids {
        let name = format!("echo_{id}");
        registry
            .register_tool(*id, Arc::new(EchoTool { name }))
            .await;
    }
    Arc::new(RegistryToolLoader::new(registry))
}

/// Loader counting every tool it is asked to construct.
#[derive(Default)]
pub(crate) struct CountingLoader {
    inner: RegistryToolLoader,
    pub constructed: AtomicUsize,
}

impl CountingLoader {
    pub(crate) fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolLoader for CountingLoader {
    async fn load_function_tools(
        &self,
        tool_ids: &[String],
        llm: &LlmRef,
    ) -> nodeflow_tools::Result<Vec<Arc<dyn Tool>>> {
        self.constructed.fetch_add(tool_ids.len(), Ordering::SeqCst);
        Ok(tool_ids
            .iter()
            .map(|id| {
                Arc::new(EchoTool {
                    name: format!("echo_{id}_{}", llm.model_id()),
                }) as Arc<dyn Tool>
            })
            .collect())
    }

    async fn load_retriever_tool(
        &self,
        spec: RetrieverToolSpec,
    ) -> nodeflow_tools::Result<Arc<dyn Tool>> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        self.inner.load_retriever_tool(spec).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingCallbacks {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingCallbacks {
    pub(crate) fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CallbackManager for RecordingCallbacks {
    async fn send(&self, event: StreamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// One recorded agent call.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub invocation: AgentInvocation,
    pub output_key: String,
    pub execution_id: String,
    pub output_to_user: bool,
}

/// Agent answering from a script shared by every agent the factory builds,
/// in call order.
pub(crate) struct ScriptedRuntime {
    answers: Arc<Mutex<Vec<Result<Vec<ChatMessage>>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn invoke(
        &self,
        invocation: AgentInvocation,
        callback: &NodeCallback,
    ) -> Result<Vec<ChatMessage>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                invocation,
                output_key: callback.output_key.clone(),
                execution_id: callback.execution_id.clone(),
                output_to_user: callback.output_to_user,
            });
        }
        let answer = self
            .answers
            .lock()
            .map_err(|_| AgentError::invocation("script poisoned"))?
            .pop()
            .unwrap_or_else(|| Ok(vec![ChatMessage::assistant("done")]));

        if let Ok(messages) = &answer
            && let Some(last) = messages.last()
        {
            callback
                .emit(StreamEventKind::Final {
                    content: last.content.clone(),
                })
                .await;
        }
        answer
    }
}

/// Factory counting agent constructions and keeping the last config.
#[derive(Default)]
pub(crate) struct ScriptedRuntimeFactory {
    answers: Arc<Mutex<Vec<Result<Vec<ChatMessage>>>>>,
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub builds: AtomicUsize,
    pub last_config: Mutex<Option<AgentConfig>>,
}

impl ScriptedRuntimeFactory {
    /// Answers are handed out in the given order.
    pub(crate) fn with_answers(answers: Vec<Result<Vec<ChatMessage>>>) -> Self {
        let mut answers = answers;
        answers.reverse();
        Self {
            answers: Arc::new(Mutex::new(answers)),
            ..Default::default()
        }
    }

    pub(crate) fn replying(texts: &[&str]) -> Self {
        Self::with_answers(
            texts
                .iter()
                .map(|t| Ok(vec![ChatMessage::assistant("thinking"), ChatMessage::assistant(*t)]))
                .collect(),
        )
    }

    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn last_config(&self) -> Option<AgentConfig> {
        self.last_config.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl AgentRuntimeFactory for ScriptedRuntimeFactory {
    async fn build(&self, config: AgentConfig) -> Result<Arc<dyn AgentRuntime>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_config.lock() {
            *last = Some(config);
        }
        Ok(Arc::new(ScriptedRuntime {
            answers: Arc::clone(&self.answers),
            calls: Arc::clone(&self.calls),
        }))
    }
}
