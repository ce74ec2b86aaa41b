//! Error types for nodeflow-core.

use thiserror::Error;

/// Result type for workflow state and node operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Error types that can occur while reading or mutating workflow state.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Context manipulation error.
    #[error("Context error: {0}")]
    Context(String),

    /// Node construction error.
    #[error("Construction error: {0}")]
    Construction(String),

    /// A variable reference does not resolve to any value in the state.
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// A variable reference is syntactically invalid.
    #[error("Invalid variable reference '{reference}': {reason}")]
    InvalidReference {
        /// The offending reference
        reference: String,
        /// Why it was rejected
        reason: String,
    },

    /// The language model client failed.
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid state transition.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// Serialization/Deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error.
    #[error("Error: {0}")]
    Generic(#[from] eyre::Report),
}

impl FlowError {
    /// Create a new context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// Create a new construction error.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a variable-not-found error.
    pub fn variable_not_found(reference: impl Into<String>) -> Self {
        Self::VariableNotFound(reference.into())
    }

    /// Create an invalid reference error.
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid transition error.
    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
}
