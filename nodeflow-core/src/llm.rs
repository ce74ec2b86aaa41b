//! Language model handle passed to agents and tools.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{error::Result, message::ChatMessage};

/// A configured chat model.
///
/// The inference client lives outside nodeflow; nodes only carry the handle
/// and give it to the agent runtime and to tools that need a model.
#[async_trait]
pub trait LanguageModel: Send + Sync + Debug {
    /// Identifier of the model in the model registry.
    fn model_id(&self) -> &str;

    /// Sampling temperature the model was configured with.
    fn temperature(&self) -> f32;

    /// Run one chat completion.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatMessage>;
}

/// Shared handle to a language model.
pub type LlmRef = Arc<dyn LanguageModel>;
