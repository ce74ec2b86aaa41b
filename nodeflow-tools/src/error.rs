use std::fmt;

use thiserror::Error;

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Main error type for tool operations
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Retrieval backend error: {backend}: {message}")]
    Retrieval { backend: String, message: String },
}

impl ToolError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an invalid parameters error
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create an invalid field error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a retrieval backend error
    pub fn retrieval(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Get the error category for classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::InvalidParameters(_) | Self::InvalidField { .. } => ErrorCategory::InvalidInput,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Retrieval { .. } => ErrorCategory::ExternalService,
        }
    }

    /// Check if the error is a user error (not a system error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::InvalidInput | ErrorCategory::NotFound
        )
    }
}

/// Error categories for classification and handling
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    InvalidInput,
    Validation,
    ExternalService,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::InvalidInput => write!(f, "invalid_input"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::ExternalService => write!(f, "external_service"),
        }
    }
}
