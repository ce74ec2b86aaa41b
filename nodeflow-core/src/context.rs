//! Workflow state shared between nodes.

use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{FlowError, Result},
    message::{ChatMessage, ChatRole},
};

/// Read/write access to the state of a running workflow.
///
/// Nodes never hold the state across executions; the engine hands it to a
/// node for the duration of one run and serializes access between nodes.
pub trait GraphState: Send + Sync {
    /// Resolve a variable reference of the form `node_id.key` or
    /// `node_id.key#index` (the latter indexes into a list value).
    fn get_variable(&self, reference: &str) -> Result<Value>;

    /// The most recent `depth` chat turns, oldest first.
    fn history(&self, depth: usize) -> Vec<ChatMessage>;

    /// Append a conversational turn authored by `sender`.
    fn append_turn(&mut self, content: &str, sender: ChatRole) -> Result<()>;
}

/// In-memory workflow state.
///
/// Variables are scoped by the id of the node that produced them. The
/// context also carries free-form metadata and the chat transcript of the
/// session the workflow runs in.
#[derive(Clone, Debug, Default)]
pub struct Context {
    /// Node outputs keyed by node id, then by variable key
    variables: HashMap<String, HashMap<String, Value>>,
    /// Metadata for the context
    metadata: HashMap<String, Value>,
    /// Chat transcript, oldest first
    history: Vec<ChatMessage>,
    /// Maximum number of retained chat turns
    history_limit: Option<usize>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain at most `limit` chat turns, dropping the oldest first.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self.trim_history();
        self
    }

    /// Set a variable produced by `node_id`.
    pub fn set_variable(
        &mut self,
        node_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Serialize,
    ) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.variables
            .entry(node_id.into())
            .or_default()
            .insert(key.into(), json_value);
        Ok(())
    }

    /// Get a variable by reference and deserialize it.
    pub fn get_variable_as<T>(&self, reference: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = GraphState::get_variable(self, reference)?;
        serde_json::from_value(value).map_err(FlowError::from)
    }

    /// Check if a variable reference resolves.
    pub fn contains_variable(&self, reference: &str) -> bool {
        GraphState::get_variable(self, reference).is_ok()
    }

    /// Set metadata.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.metadata.insert(key.into(), json_value);
        Ok(())
    }

    /// Get metadata.
    pub fn get_metadata<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.metadata
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(FlowError::from)
    }

    /// Get raw metadata value.
    pub fn get_metadata_raw(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Append a message to the chat transcript.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.history.push(message);
        self.trim_history();
    }

    /// The full chat transcript.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Merge another context into this one.
    ///
    /// Variables and metadata from the other context override existing
    /// values with the same keys. The transcript is left untouched.
    pub fn merge(&mut self, other: &Context) {
        for (node_id, values) in &other.variables {
            let target = self.variables.entry(node_id.clone()).or_default();
            for (key, value) in values {
                target.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &other.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    fn trim_history(&mut self) {
        if let Some(limit) = self.history_limit
            && self.history.len() > limit
        {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

impl GraphState for Context {
    fn get_variable(&self, reference: &str) -> Result<Value> {
        let (node_id, key) = reference
            .split_once('.')
            .ok_or_else(|| FlowError::invalid_reference(reference, "expected node_id.key"))?;

        let (key, index) = match key.rsplit_once('#') {
            Some((key, index)) => {
                let index = index.parse::<usize>().map_err(|_| {
                    FlowError::invalid_reference(reference, "list index is not a number")
                })?;
                (key, Some(index))
            }
            None => (key, None),
        };

        let value = self
            .variables
            .get(node_id)
            .and_then(|values| values.get(key))
            .ok_or_else(|| FlowError::variable_not_found(reference))?;

        match index {
            None => Ok(value.clone()),
            Some(index) => value
                .as_array()
                .and_then(|items| items.get(index))
                .cloned()
                .ok_or_else(|| FlowError::variable_not_found(reference)),
        }
    }

    fn history(&self, depth: usize) -> Vec<ChatMessage> {
        let start = self.history.len().saturating_sub(depth);
        self.history[start..].to_vec()
    }

    fn append_turn(&mut self, content: &str, sender: ChatRole) -> Result<()> {
        debug!(role = %sender, len = content.len(), "Appending chat turn");
        self.push_message(ChatMessage::new(sender, content));
        Ok(())
    }
}

/// Builder for creating contexts with initial data.
#[derive(Default)]
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    /// Create a new context builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a node variable.
    pub fn with_variable(
        mut self,
        node_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self> {
        self.context.set_variable(node_id, key, value)?;
        Ok(self)
    }

    /// Set metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self> {
        self.context.set_metadata(key, value)?;
        Ok(self)
    }

    /// Append a chat message.
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.context.push_message(message);
        self
    }

    /// Build the context.
    pub fn build(self) -> Context {
        self.context
    }
}
