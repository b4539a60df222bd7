use std::collections::HashMap;
use std::sync::Arc;

use forge_agents::{AgentRegistry, JobContext};
use forge_core::{JobId, Proposal, ProposalRequest, RequestValidationError, TaskKind};
use forge_llm::LlmGateway;
use forge_sources::SourceConnector;
use forge_store::{task_output_key, StateStore};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::types::NodeStatus;

/// Failure modes visible above the scheduler's internal retry machinery.
#[derive(Debug, Error)]
pub enum JobError {
    /// The request never made it past intake.
    #[error("invalid request: {0}")]
    Validation(#[from] RequestValidationError),
    /// A critical-path task exhausted its retries (or failed non-retryably).
    #[error("{kind} failed: {message}")]
    TaskFailed { kind: TaskKind, message: String },
    /// The job was cancelled before it reached a terminal state.
    #[error("job cancelled")]
    Cancelled,
    /// An invariant was violated; never expected in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
    /// The requested job id is unknown to this facade.
    #[error("job not found")]
    NotFound,
}

impl From<forge_core::ForgeError> for JobError {
    fn from(e: forge_core::ForgeError) -> Self {
        JobError::Internal(e.to_string())
    }
}

/// A point-in-time snapshot of a job's progress, safe to hand back to an API
/// caller without exposing the graph's internals.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// Submitted but not yet dispatched.
    Pending,
    /// At least one node has started; `node_statuses` is a point-in-time
    /// snapshot, not necessarily up to the moment of the call.
    Running { node_statuses: HashMap<TaskKind, NodeStatus> },
    /// `assembly` succeeded; the proposal is ready.
    Completed { proposal: Box<Proposal> },
    /// A critical-path task failed, or the graph deadlocked.
    Failed { kind: Option<TaskKind>, message: String },
    /// Cancelled before reaching a terminal state.
    Cancelled,
}

struct JobEntry {
    handle: JoinHandle<()>,
    cancellation: CancellationToken,
    status: Arc<RwLock<JobStatus>>,
}

/// Owns every job submitted to this process: validates and registers new
/// ones, runs each to completion on its own background task, and answers
/// status/result/cancel queries concurrently with the run in progress.
///
/// Generalized from a single run holding one task queue to many concurrent
/// jobs, each with its own graph and cancellation token, behind a facade
/// an HTTP layer can call directly.
pub struct JobFacade {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn StateStore>,
    llm: Arc<LlmGateway>,
    sources: Arc<HashMap<String, Arc<dyn SourceConnector>>>,
    scheduler_config: SchedulerConfig,
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobFacade {
    pub fn new(
        registry: Arc<AgentRegistry>,
        store: Arc<dyn StateStore>,
        llm: Arc<LlmGateway>,
        sources: Arc<HashMap<String, Arc<dyn SourceConnector>>>,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self { registry, store, llm, sources, scheduler_config, jobs: RwLock::new(HashMap::new()) }
    }

    /// Validates `request` and, on success, starts it running in the
    /// background immediately. Returns the job id the caller polls with
    /// [`JobFacade::status`]. Validation failure never creates a job.
    pub async fn submit(&self, request: ProposalRequest) -> Result<JobId, JobError> {
        request.validate()?;

        let job_id = JobId::new();
        let cancellation = CancellationToken::new();
        let status = Arc::new(RwLock::new(JobStatus::Pending));
        let max_parallel = request.max_parallel_tasks(self.scheduler_config.max_parallel_tasks);

        let mut config = self.scheduler_config.clone();
        config.max_parallel_tasks = max_parallel.max(1);

        let job_ctx = JobContext::new(
            self.store.clone(),
            self.llm.clone(),
            self.sources.clone(),
            job_id,
            cancellation.clone(),
        );
        let scheduler = Scheduler::new(self.registry.clone(), config);
        let request = Arc::new(request);
        let status_for_task = status.clone();
        let store_for_task = self.store.clone();

        let handle = tokio::spawn(async move {
            *status_for_task.write().await = JobStatus::Running { node_statuses: HashMap::new() };
            let (_graph, outcome) = scheduler.run(request, job_ctx).await;
            let new_status = match outcome {
                Ok(()) => match load_proposal(&store_for_task, job_id).await {
                    Ok(Some(proposal)) => JobStatus::Completed { proposal: Box::new(proposal) },
                    Ok(None) => JobStatus::Failed {
                        kind: Some(TaskKind::Assembly),
                        message: "assembly succeeded but produced no output".to_string(),
                    },
                    Err(e) => JobStatus::Failed { kind: Some(TaskKind::Assembly), message: e.to_string() },
                },
                Err(JobError::Cancelled) => JobStatus::Cancelled,
                Err(JobError::TaskFailed { kind, message }) => {
                    JobStatus::Failed { kind: Some(kind), message }
                }
                Err(e) => JobStatus::Failed { kind: None, message: e.to_string() },
            };
            if let JobStatus::Failed { kind, message } = &new_status {
                warn!(job_id = %job_id, ?kind, message, "job did not complete");
            } else {
                info!(job_id = %job_id, "job finished");
            }
            *status_for_task.write().await = new_status;
        });

        self.jobs.write().await.insert(job_id, JobEntry { handle, cancellation, status });
        Ok(job_id)
    }

    /// The job's current status. `NotFound` if `job_id` was never submitted
    /// to this facade (it does not survive a process restart).
    pub async fn status(&self, job_id: JobId) -> Result<JobStatus, JobError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or(JobError::NotFound)?;
        Ok(entry.status.read().await.clone())
    }

    /// Number of jobs not yet in a terminal status. Used for the gateway's
    /// `GET /status` surface; an approximation since a job can finish
    /// between this call returning and the caller reading it.
    pub async fn active_workflow_count(&self) -> usize {
        let jobs = self.jobs.read().await;
        let mut count = 0;
        for entry in jobs.values() {
            if matches!(*entry.status.read().await, JobStatus::Pending | JobStatus::Running { .. }) {
                count += 1;
            }
        }
        count
    }

    /// Requests cancellation. The background run observes the token at its
    /// next suspension point; this call does not block on that happening.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), JobError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or(JobError::NotFound)?;
        entry.cancellation.cancel();
        Ok(())
    }

    /// Blocks until the job's background task has finished and returns its
    /// final status. Intended for tests and the `forge-cli run` subcommand;
    /// the HTTP surface polls [`JobFacade::status`] instead.
    pub async fn join(&self, job_id: JobId) -> Result<JobStatus, JobError> {
        let handle = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs.get_mut(&job_id).ok_or(JobError::NotFound)?;
            std::mem::replace(&mut entry.handle, tokio::spawn(async {}))
        };
        let _ = handle.await;
        self.status(job_id).await
    }
}

async fn load_proposal(
    store: &Arc<dyn StateStore>,
    job_id: JobId,
) -> Result<Option<Proposal>, forge_core::ForgeError> {
    let key = task_output_key(job_id, TaskKind::Assembly);
    let value = store.get(&key).await.map_err(|e| forge_core::ForgeError::Internal(e.to_string()))?;
    value.map(serde_json::from_value).transpose().map_err(forge_core::ForgeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_llm::GatewayConfig;
    use forge_store::InMemoryStateStore;

    fn facade() -> JobFacade {
        let registry = Arc::new(AgentRegistry::build(forge_agents::default_agents()).unwrap());
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let llm = Arc::new(LlmGateway::new(GatewayConfig::default()));
        let sources: Arc<HashMap<String, Arc<dyn SourceConnector>>> = Arc::new(
            [("arxiv".to_string(), Arc::new(forge_sources::MockSourceConnector::new("arxiv")) as Arc<dyn SourceConnector>)]
                .into_iter()
                .collect(),
        );
        JobFacade::new(registry, store, llm, sources, SchedulerConfig::default())
    }

    #[tokio::test]
    async fn a_too_short_topic_is_rejected_before_a_job_is_created() {
        let facade = facade();
        let request = ProposalRequest {
            topic: "short".to_string(),
            key_points: vec![],
            preferences: HashMap::new(),
            author: None,
            institution: None,
            department: None,
        };
        let err = facade.submit(request).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[tokio::test]
    async fn a_valid_topic_runs_to_completion_in_mock_mode() {
        let facade = facade();
        let request = ProposalRequest {
            topic: "Microgravity effects on cell division".to_string(),
            key_points: vec!["radiation".to_string()],
            preferences: HashMap::new(),
            author: None,
            institution: None,
            department: None,
        };
        let job_id = facade.submit(request).await.unwrap();
        let status = facade.join(job_id).await.unwrap();
        match status {
            JobStatus::Completed { proposal } => {
                assert!(!proposal.sections.is_empty());
                assert!(proposal.metadata.agents_involved.contains(&TaskKind::Literature));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let facade = facade();
        let err = facade.status(JobId::new()).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound));
    }
}
