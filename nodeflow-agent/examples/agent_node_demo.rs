//! Runs a batch-mode agent node against a real model through `genai`.
//!
//! Set the provider key for the chosen model (`OPENAI_API_KEY` for the
//! default) and optionally `NODEFLOW_MODEL` to pick another model.

use std::sync::Arc;

use nodeflow_agent::prelude::*;
use nodeflow_tools::{
    KeywordSearchClient, KeywordStoreParams, RegistryToolLoader, VectorSearchClient,
    VectorStoreParams,
};

struct DemoModels {
    model: String,
}

#[async_trait]
impl ModelRegistry for DemoModels {
    async fn operator_models(&self) -> nodeflow_agent::Result<Vec<OperatorModel>> {
        Ok(vec![OperatorModel::new("1", ExecutorType::FunctionCall)])
    }

    async fn get_llm(&self, _model_id: &str, temperature: f32) -> nodeflow_agent::Result<LlmRef> {
        Ok(Arc::new(GenaiModel::new(self.model.as_str(), temperature)))
    }
}

struct NoKnowledge;

#[async_trait]
impl KnowledgeStore for NoKnowledge {
    async fn lookup_by_id(
        &self,
        _id: &str,
    ) -> nodeflow_agent::Result<Option<nodeflow_agent::KnowledgeInfo>> {
        Ok(None)
    }
}

#[async_trait]
impl RetrievalBackend for NoKnowledge {
    async fn build_vector_client(
        &self,
        _params: VectorStoreParams,
    ) -> nodeflow_agent::Result<Arc<dyn VectorSearchClient>> {
        Err(AgentError::configuration("no vector store configured"))
    }

    async fn build_keyword_client(
        &self,
        _params: KeywordStoreParams,
    ) -> nodeflow_agent::Result<Arc<dyn KeywordSearchClient>> {
        Err(AgentError::configuration("no keyword store configured"))
    }

    async fn default_embedding(&self) -> nodeflow_agent::Result<Option<String>> {
        Ok(None)
    }
}

/// Answers in one model turn without tool calls.
struct SingleTurnAgent {
    config: AgentConfig,
}

#[async_trait]
impl AgentRuntime for SingleTurnAgent {
    async fn invoke(
        &self,
        invocation: AgentInvocation,
        callback: &NodeCallback,
    ) -> nodeflow_agent::Result<Vec<ChatMessage>> {
        let mut messages = vec![ChatMessage::system(self.config.system_prompt.as_str())];
        match invocation {
            AgentInvocation::ReAct {
                input,
                chat_history,
            } => {
                messages.extend(chat_history);
                messages.push(ChatMessage::user(input));
            }
            AgentInvocation::Chat { messages: turns } => messages.extend(turns),
        }

        let reply = self.config.llm.chat(&messages).await?;
        callback
            .emit(StreamEventKind::Final {
                content: reply.content.clone(),
            })
            .await;
        Ok(vec![reply])
    }
}

struct SingleTurnFactory;

#[async_trait]
impl AgentRuntimeFactory for SingleTurnFactory {
    async fn build(&self, config: AgentConfig) -> nodeflow_agent::Result<Arc<dyn AgentRuntime>> {
        Ok(Arc::new(SingleTurnAgent { config }))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let model = std::env::var("NODEFLOW_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let deps = AgentDeps::new(
        Arc::new(DemoModels { model }),
        Arc::new(RegistryToolLoader::default()),
        Arc::new(NoKnowledge),
        Arc::new(NoKnowledge),
        Arc::new(SingleTurnFactory),
        OrchestratorSettings::new("demo-workflow"),
    );

    let params = NodeParams::new("1")
        .with_prompts(
            "You are a {start_1.role}. Answer in one sentence.",
            "Explain: {agent_1.batch_variable}",
        )
        .with_batch([("start_1.topic_a", "output_a"), ("start_1.topic_b", "output_b")]);
    let node = AgentNode::new("agent_1", params, deps)?;

    let context = ContextBuilder::new()
        .with_variable("start_1", "role", "patient tutor")?
        .with_variable("start_1", "topic_a", "ownership in Rust")?
        .with_variable("start_1", "topic_b", "async/await")?
        .build();

    let (context, phase) = node.execute(context).await?;
    println!("finished in phase {phase:?}");
    for key in ["output_a", "output_b"] {
        let answer = context.get_variable_as::<String>(&format!("agent_1.{key}"))?;
        println!("{key}: {answer}");
    }
    if let Some(log) = context.get_metadata::<serde_json::Value>(&node.log_key())? {
        println!("{}", serde_json::to_string_pretty(&log)?);
    }
    Ok(())
}
