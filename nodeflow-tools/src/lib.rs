//! Nodeflow Tools - callable tools for nodeflow agents
//!
//! This crate provides the interface agents use to call tools. It includes:
//!
//! - A tool abstraction with JSON schema parameter validation
//! - A registry of tool factories keyed by the identifiers used in node configuration
//! - The [`ToolLoader`] capability that turns configuration into callable tools
//! - Knowledge retrieval tools over a vector client and a keyword client
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use nodeflow_tools::prelude::*;
//!
//! #[derive(Debug)]
//! struct EchoTool;
//!
//! #[async_trait]
//! impl Tool for EchoTool {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Echo input back" }
//!     fn category(&self) -> ToolCategory { ToolCategory::Function }
//!
//!     fn parameter_schema(&self) -> serde_json::Value {
//!         ToolParameters::new_schema()
//!             .add_required("message", "string", "Message to echo")
//!             .into()
//!     }
//!
//!     async fn execute(&self, params: ToolParameters, _ctx: ToolContext) -> Result<ToolResult> {
//!         let message: String = params.get("message")?;
//!         Ok(ToolResult::success(message))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ToolRegistry::new();
//!     registry.register_tool("12", Arc::new(EchoTool)).await;
//!     assert!(registry.contains("12").await);
//! }
//! ```

/// Core tool abstractions and trait definitions.
pub mod core;
/// Error types for tool operations.
pub mod error;
/// Tool loading capability.
pub mod loader;
/// Tool registry for discovery and execution.
pub mod registry;
/// Retrieval clients and knowledge tools.
pub mod retrieval;

// Re-export commonly used types
pub use core::{
    Tool, ToolCapability, ToolCategory, ToolContext, ToolInfo, ToolParameters, ToolResult,
};

pub use error::{ErrorCategory, Result, ToolError};
pub use loader::{RegistryToolLoader, ToolLoader};
pub use registry::{RegistryStats, ToolFactory, ToolRegistry};
pub use retrieval::{
    KeywordSearchClient, KeywordStoreParams, KnowledgeRetrievalTool, MetadataFilter,
    RetrievalConfig, RetrievedChunk, RetrieverToolSpec, VectorSearchClient, VectorStoreParams,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use uuid::Uuid;

    pub use crate::{
        core::{
            Tool, ToolCapability, ToolCategory, ToolContext, ToolInfo, ToolParameters, ToolResult,
        },
        error::{ErrorCategory, Result, ToolError},
        loader::{RegistryToolLoader, ToolLoader},
        registry::ToolRegistry,
        retrieval::{
            KeywordSearchClient, KeywordStoreParams, KnowledgeRetrievalTool, MetadataFilter,
            RetrievalConfig, RetrievedChunk, RetrieverToolSpec, VectorSearchClient,
            VectorStoreParams,
        },
    };
}
