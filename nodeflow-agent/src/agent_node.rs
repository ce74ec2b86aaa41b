//! Agent node implementation for nodeflow workflows.

use std::fmt;

use async_trait::async_trait;
use nodeflow_core::prelude::{Context, FlowError, Node};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::Result,
    orchestrator::{AgentDeps, AgentOrchestrator, ExecutionPhase},
    params::NodeParams,
};

/// Metadata key holding the id of the current workflow execution.
pub const EXECUTION_ID_KEY: &str = "unique_id";

/// Workflow node running an agent.
///
/// Outputs are written to the context as `{node_id}.{output_key}` and the
/// audit log goes to metadata under `{node_id}.log`.
pub struct AgentNode {
    orchestrator: AgentOrchestrator,
}

impl AgentNode {
    pub fn new(node_id: impl Into<String>, params: NodeParams, deps: AgentDeps) -> Result<Self> {
        Ok(Self::from_orchestrator(AgentOrchestrator::new(
            node_id, params, deps,
        )?))
    }

    pub fn from_orchestrator(orchestrator: AgentOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &AgentOrchestrator {
        &self.orchestrator
    }

    pub fn node_id(&self) -> &str {
        self.orchestrator.node_id()
    }

    /// Metadata key the audit log is stored under.
    pub fn log_key(&self) -> String {
        format!("{}.log", self.node_id())
    }

    fn execution_id(context: &Context) -> String {
        match context.get_metadata::<String>(EXECUTION_ID_KEY) {
            Ok(Some(id)) => id,
            _ => {
                let id = Uuid::new_v4().to_string();
                debug!(execution_id = %id, "No execution id in context, generated one");
                id
            }
        }
    }
}

impl fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentNode")
            .field("node_id", &self.node_id())
            .field("mode", &self.orchestrator.params().mode())
            .field("batch_sentinel", &self.orchestrator.batch_sentinel())
            .finish()
    }
}

#[async_trait]
impl Node for AgentNode {
    type State = ExecutionPhase;

    async fn execute(
        &self,
        mut context: Context,
    ) -> std::result::Result<(Context, Self::State), FlowError> {
        let execution_id = Self::execution_id(&context);
        info!(node_id = %self.node_id(), execution_id = %execution_id, "AgentNode executing");

        let result = self.orchestrator.run(&mut context, &execution_id).await?;

        for (key, text) in &result.outputs {
            context.set_variable(self.node_id(), key.as_str(), text)?;
        }
        context.set_metadata(self.log_key(), result.log())?;

        Ok((context, result.log.phase()))
    }

    fn name(&self) -> String {
        format!("AgentNode({})", self.node_id())
    }
}
