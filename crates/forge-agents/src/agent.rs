use async_trait::async_trait;
use forge_core::{AgentInput, AgentOutput, ForgeError, TaskKind};

use crate::context::JobContext;

/// One content-producing worker. An agent never calls another agent; all
/// fan-in happens through `input.dependency_outputs`, populated by the
/// scheduler from the task graph's dependency edges.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The task kind this agent fulfills. Used by the registry to route work.
    fn kind(&self) -> TaskKind;

    /// Cheap, synchronous precondition check run before dispatch. Should
    /// reject malformed or incomplete input without touching the network.
    fn validate_input(&self, input: &AgentInput) -> Result<(), ForgeError>;

    /// Produces this agent's output. Implementations should check
    /// `ctx.cancellation` at any natural suspension point (before an LLM
    /// call, between source-connector requests) and return
    /// `ForgeError::Cancelled` if it has fired.
    async fn execute(&self, input: AgentInput, ctx: &JobContext) -> Result<AgentOutput, ForgeError>;
}
