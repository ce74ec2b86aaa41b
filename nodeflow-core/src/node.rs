//! Node abstraction for nodeflow workflows.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{context::Context, error::Result, state::FlowState};

/// Trait for workflow nodes.
///
/// A node represents a unit of work in a workflow. It takes the workflow
/// context, performs some operation, and returns an updated context along
/// with the state it finished in.
#[async_trait]
pub trait Node: Send + Sync + Debug {
    /// The state type this node works with.
    type State: FlowState;

    /// Execute the node's logic.
    ///
    /// This method receives the current context and should return:
    /// - The updated context
    /// - The state the node finished in
    async fn execute(&self, context: Context) -> Result<(Context, Self::State)>;

    /// Optional preparation step before execution.
    ///
    /// This can be used for validation, setup, or other preprocessing.
    async fn prepare(&self, context: &Context) -> Result<()> {
        let _ = context;
        Ok(())
    }

    /// Optional cleanup step after execution.
    async fn cleanup(&self, context: &Context, state: &Self::State) -> Result<()> {
        let _ = (context, state);
        Ok(())
    }

    /// Get the name of this node for debugging/logging.
    fn name(&self) -> String {
        format!("{self:?}")
    }
}
