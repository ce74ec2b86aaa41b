//! Error types for nodeflow agent operations.

use nodeflow_core::prelude::FlowError;
use nodeflow_tools::ToolError;
use thiserror::Error;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Main error type for agent operations.
///
/// Every error is fatal to the running node execution: nothing is retried
/// and remaining batch items are skipped.
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// Node or model configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced knowledge base or file does not resolve.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed template syntax.
    #[error("Template error at offset {offset}: {message}")]
    Template { offset: usize, message: String },

    /// A template reference was rendered without a value.
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// The agent runtime failed.
    #[error("Agent invocation failed: {0}")]
    Invocation(String),

    /// The agent runtime returned no message.
    #[error("Agent returned no messages for output '{0}'")]
    EmptyResult(String),

    #[error("Context error: {0}")]
    Context(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any of the above, tagged with the node that raised it.
    #[error("Node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: Box<AgentError>,
    },
}

impl AgentError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a template error
    pub fn template(offset: usize, message: impl Into<String>) -> Self {
        Self::Template {
            offset,
            message: message.into(),
        }
    }

    /// Create a missing variable error
    pub fn missing_variable(reference: impl Into<String>) -> Self {
        Self::MissingVariable(reference.into())
    }

    /// Create an invocation error
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation(message.into())
    }

    /// Create an empty result error
    pub fn empty_result(output_key: impl Into<String>) -> Self {
        Self::EmptyResult(output_key.into())
    }

    /// Create a context error
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context(message.into())
    }

    /// Tag an error with the node it came from. Already tagged errors are
    /// returned unchanged.
    pub fn in_node(self, node_id: impl Into<String>) -> Self {
        match self {
            Self::Node { .. } => self,
            other => Self::Node {
                node_id: node_id.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, without node tagging.
    pub fn kind(&self) -> &AgentError {
        match self {
            Self::Node { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Check if the error is a user error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind(),
            Self::Configuration(_) | Self::NotFound(_) | Self::Template { .. }
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> &'static str {
        match self.kind() {
            Self::Configuration(_) => "configuration",
            Self::NotFound(_) => "not_found",
            Self::Template { .. } => "template",
            Self::MissingVariable(_) => "missing_variable",
            Self::Invocation(_) => "invocation",
            Self::EmptyResult(_) => "empty_result",
            Self::Context(_) => "context",
            Self::Tool(_) => "tool",
            Self::Serialization(_) => "serialization",
            Self::Node { .. } => "node",
        }
    }
}

// Standard library integrations
impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<genai::Error> for AgentError {
    fn from(err: genai::Error) -> Self {
        Self::Invocation(err.to_string())
    }
}

// Integration with nodeflow-core
impl From<AgentError> for FlowError {
    fn from(err: AgentError) -> Self {
        match err.kind() {
            AgentError::Configuration(_)
            | AgentError::NotFound(_)
            | AgentError::Template { .. } => FlowError::construction(err.to_string()),
            AgentError::Invocation(_) | AgentError::EmptyResult(_) => {
                FlowError::model(err.to_string())
            }
            _ => FlowError::context(err.to_string()),
        }
    }
}

impl From<FlowError> for AgentError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Model(message) => Self::Invocation(message),
            other => Self::Context(other.to_string()),
        }
    }
}

// Integration with nodeflow-tools
impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(id) => Self::NotFound(format!("tool {id}")),
            other => Self::Tool(other.to_string()),
        }
    }
}
