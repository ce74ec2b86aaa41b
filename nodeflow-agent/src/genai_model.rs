//! [`LanguageModel`] backed by the `genai` multi-provider client.

use async_trait::async_trait;
use genai::{
    Client,
    chat::{ChatMessage as GenaiMessage, ChatOptions, ChatRequest},
};
use nodeflow_core::{
    error::{FlowError, Result as FlowResult},
    llm::LanguageModel,
    message::{ChatMessage, ChatRole},
};
use tracing::debug;

use crate::error::AgentError;

/// Chat model reached through `genai`. The provider is inferred from the
/// model name and credentials come from the provider's usual environment
/// variables.
#[derive(Clone)]
pub struct GenaiModel {
    client: Client,
    model: String,
    temperature: f32,
}

impl GenaiModel {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            temperature,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn to_request(messages: &[ChatMessage]) -> ChatRequest {
        let messages: Vec<GenaiMessage> = messages
            .iter()
            .map(|m| match m.role {
                ChatRole::System => GenaiMessage::system(m.content.clone()),
                ChatRole::User => GenaiMessage::user(m.content.clone()),
                ChatRole::Assistant => GenaiMessage::assistant(m.content.clone()),
            })
            .collect();
        ChatRequest::new(messages)
    }
}

impl std::fmt::Debug for GenaiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiModel")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LanguageModel for GenaiModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    async fn chat(&self, messages: &[ChatMessage]) -> FlowResult<ChatMessage> {
        let options = ChatOptions::default().with_temperature(f64::from(self.temperature));
        debug!(model = %self.model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .exec_chat(&self.model, Self::to_request(messages), Some(&options))
            .await
            .map_err(|e| FlowError::from(AgentError::from(e)))?;

        let content = response
            .content_text_into_string()
            .ok_or_else(|| FlowError::model(format!("{} returned no text", self.model)))?;
        Ok(ChatMessage::assistant(content))
    }
}
