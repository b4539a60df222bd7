use chrono::{DateTime, Utc};
use forge_core::TaskKind;

/// Lifecycle state of one node in a job's task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Not yet dispatched; waiting on one or more dependencies.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully; its output is in the state store.
    Succeeded,
    /// Exhausted its retry budget (or failed with a non-retryable error).
    Failed,
    /// Never ran: either an ancestor failed or the job was cancelled.
    Cancelled,
}

impl NodeStatus {
    /// Terminal states are never revisited by the scheduler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Cancelled)
    }
}

/// One node of a job's task graph: a task kind, its declared dependencies,
/// and the scheduler's bookkeeping for it.
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Which agent this node dispatches to.
    pub kind: TaskKind,
    /// The canonical dependency edges for this kind.
    pub deps: &'static [TaskKind],
    /// Current lifecycle state.
    pub status: NodeStatus,
    /// Number of dispatch attempts made so far (1 after the first try).
    pub attempts: u32,
    /// Maximum retries on top of the first attempt. `0` for deterministic
    /// kinds that have nothing to gain from retrying the same input.
    pub max_retries: u32,
    /// Set when the node transitions to `Running` for the first time.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the node reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// The last error's message, if the node ended in `Failed`.
    pub error: Option<String>,
}

impl TaskNode {
    pub fn new(kind: TaskKind, deps: &'static [TaskKind], max_retries: u32) -> Self {
        Self {
            kind,
            deps,
            status: NodeStatus::Pending,
            attempts: 0,
            max_retries,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}
