//! Shared data model and error taxonomy for the proposal orchestration core.
//!
//! This crate has no async runtime dependency and no I/O of its own; it
//! exists so that the scheduler, the state store, the LLM gateway, source
//! connectors, and agents can all agree on the same `TaskKind`, `JobId`,
//! error taxonomy, and wire types without depending on each other.

mod error;
mod ids;
mod model;

pub use error::{ErrorKind, ForgeError, ForgeResult};
pub use ids::{JobId, TaskKind, UnknownTaskKind};
pub use model::{
    dedupe_papers, normalize_title, AgentInput, AgentOutput, Paper, Proposal, ProposalMetadata,
    ProposalRequest, Reference, RequestValidationError, Section,
};

// TaskId is re-exported separately since it is mostly an orchestrator-internal
// concern, but other crates occasionally need to format one (e.g. logging).
pub use ids::TaskId;
