//! # nodeflow-core
//!
//! Workflow state and node abstractions shared by the nodeflow crates.
//!
//! ## Core Concepts
//!
//! - **Context**: the workflow's variable pool, metadata and chat transcript
//! - **GraphState**: the read/write contract nodes use against that state
//! - **Node**: a unit of work that consumes the context and reports a state
//! - **FlowState**: enumeration of the states a node moves through
//! - **LanguageModel**: handle to the model a node was configured with
//!
//! ## Quick Start
//!
//! ```rust
//! use nodeflow_core::prelude::*;
//!
//! let mut context = Context::new();
//! context.set_variable("start_1", "query", "2+2").unwrap();
//!
//! let value = context.get_variable("start_1.query").unwrap();
//! assert_eq!(value, serde_json::json!("2+2"));
//! ```

pub mod context;
pub mod error;
pub mod llm;
pub mod message;
pub mod node;
pub mod state;

/// Convenient re-exports for common use.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};

    pub use crate::{
        context::{Context, ContextBuilder, GraphState},
        error::{FlowError, Result},
        llm::{LanguageModel, LlmRef},
        message::{ChatMessage, ChatRole},
        node::Node,
        state::{FlowState, StateTransition},
    };
}
