use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use forge_agents::{Agent, AgentRegistry, JobContext};
use forge_core::{AgentInput, AgentOutput, ErrorKind, ForgeError, ProposalRequest, TaskKind};
use forge_store::task_output_key;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::graph::TaskGraph;
use crate::job::JobError;

/// Tunables for the scheduler's dispatch loop, drawn from `[scheduler]` in
/// the process configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently-running tasks within one job.
    pub max_parallel_tasks: usize,
    /// Per-task wall-clock budget before it's treated as a transient timeout.
    pub default_task_timeout_secs: u64,
    /// Retry budget for LLM-driven (non-deterministic) task kinds.
    pub default_max_retries: u32,
    /// First retry delay.
    pub backoff_base_ms: u64,
    /// Retry delay ceiling.
    pub backoff_max_ms: u64,
    /// How long a successful task's output survives in the state store.
    pub output_ttl_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: 3,
            default_task_timeout_secs: 300,
            default_max_retries: 2,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            output_ttl_secs: 3_600,
        }
    }
}

/// A hook invoked with the current in-flight task count every time it
/// changes, so callers (tests, the gateway's `/status` endpoint) can observe
/// concurrency without the scheduler exposing its internals.
pub type ConcurrencyProbe = Arc<dyn Fn(usize) + Send + Sync>;

/// Executes one job's task graph to completion: bounded-parallel dispatch,
/// per-node retry with backoff, cascading cancellation on critical failure,
/// and cooperative cancellation via [`JobContext::cancellation`].
///
/// A `tokio::spawn` fan-out loop over a semaphore, generalized from a
/// dynamic subtask list to the fixed canonical graph and from "fail the
/// whole run" to per-node retry budgets.
pub struct Scheduler {
    registry: Arc<AgentRegistry>,
    config: SchedulerConfig,
    concurrency_probe: Option<ConcurrencyProbe>,
}

struct NodeOutcome {
    kind: TaskKind,
    result: Result<(), ForgeError>,
    attempts: u32,
}

impl Scheduler {
    pub fn new(registry: Arc<AgentRegistry>, config: SchedulerConfig) -> Self {
        Self { registry, config, concurrency_probe: None }
    }

    /// Attaches a probe called with the current running-task count on every
    /// dispatch and completion. Test-only instrumentation for the
    /// bounded-parallelism property; production callers leave this unset.
    pub fn with_concurrency_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.concurrency_probe = Some(probe);
        self
    }

    /// Runs `request` to completion under `job_ctx`. Always returns the
    /// finished graph, whether the job succeeded, failed, or was cancelled,
    /// so a caller can inspect per-node status either way; the caller reads
    /// the assembled `Proposal` back out of the state store on success.
    pub async fn run(
        &self,
        request: Arc<ProposalRequest>,
        job_ctx: JobContext,
    ) -> (TaskGraph, Result<(), JobError>) {
        let mut graph = TaskGraph::build(self.config.default_max_retries)
            .expect("canonical task graph is statically valid");
        let (tx, mut rx) = mpsc::channel::<NodeOutcome>(TaskKind::ALL.len());
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_tasks));
        let mut running: HashMap<TaskKind, JoinHandle<()>> = HashMap::new();

        loop {
            if job_ctx.cancellation.is_cancelled() {
                self.drain_and_cancel(&mut graph, running, &mut rx).await;
                return (graph, Err(JobError::Cancelled));
            }
            if graph.is_terminal() {
                break;
            }

            for kind in graph.ready_kinds() {
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };
                graph.mark_running(kind);
                let agent = self.registry.get(kind);
                let deps = graph.node(kind).deps;
                let max_retries = graph.node(kind).max_retries;
                let job_ctx = job_ctx.clone();
                let request = request.clone();
                let tx = tx.clone();
                let cfg = self.config.clone();

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = run_node(kind, agent, job_ctx, request, deps, max_retries, &cfg).await;
                    let _ = tx.send(outcome).await;
                });
                running.insert(kind, handle);
                if let Some(probe) = &self.concurrency_probe {
                    probe(running.len());
                }
            }

            if running.is_empty() {
                return (
                    graph,
                    Err(JobError::Internal(
                        "deadlock: no ready tasks but the graph is incomplete".to_string(),
                    )),
                );
            }

            tokio::select! {
                biased;
                _ = job_ctx.cancellation.cancelled() => {
                    self.drain_and_cancel(&mut graph, running, &mut rx).await;
                    return (graph, Err(JobError::Cancelled));
                }
                Some(outcome) = rx.recv() => {
                    running.remove(&outcome.kind);
                    if let Some(probe) = &self.concurrency_probe {
                        probe(running.len());
                    }
                    match outcome.result {
                        Ok(()) => {
                            graph.mark_succeeded(outcome.kind, outcome.attempts);
                        }
                        Err(e) if e.kind() == ErrorKind::Cancelled => {
                            self.drain_and_cancel(&mut graph, running, &mut rx).await;
                            return (graph, Err(JobError::Cancelled));
                        }
                        Err(e) => {
                            let critical = graph.is_critical(outcome.kind);
                            graph.mark_failed(outcome.kind, e.to_string(), outcome.attempts);
                            error!(kind = %outcome.kind, error = %e, critical, "task failed");
                            if critical {
                                job_ctx.cancellation.cancel();
                                self.drain_and_cancel(&mut graph, running, &mut rx).await;
                                return (
                                    graph,
                                    Err(JobError::TaskFailed { kind: outcome.kind, message: e.to_string() }),
                                );
                            }
                        }
                    }
                }
            }
        }

        (graph, Ok(()))
    }

    /// Waits for every still-running worker to finish (they will observe the
    /// cancellation token at their next suspension point) and marks every
    /// non-terminal node `Cancelled`.
    async fn drain_and_cancel(
        &self,
        graph: &mut TaskGraph,
        running: HashMap<TaskKind, JoinHandle<()>>,
        rx: &mut mpsc::Receiver<NodeOutcome>,
    ) {
        for (kind, handle) in running {
            if let Err(e) = handle.await {
                warn!(kind = %kind, error = %e, "worker task panicked during drain");
            }
        }
        while rx.try_recv().is_ok() {}
        graph.cancel_all_non_terminal();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_node(
    kind: TaskKind,
    agent: Arc<dyn Agent>,
    job_ctx: JobContext,
    request: Arc<ProposalRequest>,
    deps: &'static [TaskKind],
    max_retries: u32,
    cfg: &SchedulerConfig,
) -> NodeOutcome {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match try_once(kind, agent.as_ref(), &job_ctx, &request, deps, cfg).await {
            Ok(()) => return NodeOutcome { kind, result: Ok(()), attempts },
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                return NodeOutcome { kind, result: Err(e), attempts }
            }
            Err(e) if e.is_retryable() && attempts <= max_retries => {
                let delay = cfg
                    .backoff_base_ms
                    .saturating_mul(2u64.saturating_pow(attempts - 1))
                    .min(cfg.backoff_max_ms);
                info!(kind = %kind, attempts, delay_ms = delay, "retrying after transient failure");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    _ = job_ctx.cancellation.cancelled() => {
                        return NodeOutcome { kind, result: Err(ForgeError::Cancelled), attempts };
                    }
                }
            }
            Err(e) => return NodeOutcome { kind, result: Err(e), attempts },
        }
    }
}

async fn try_once(
    kind: TaskKind,
    agent: &dyn Agent,
    job_ctx: &JobContext,
    request: &ProposalRequest,
    deps: &'static [TaskKind],
    cfg: &SchedulerConfig,
) -> Result<(), ForgeError> {
    if job_ctx.cancellation.is_cancelled() {
        return Err(ForgeError::Cancelled);
    }

    let mut dependency_outputs = HashMap::with_capacity(deps.len());
    for &dep in deps {
        let key = task_output_key(job_ctx.job_id, dep);
        let value = job_ctx
            .store
            .get(&key)
            .await
            .map_err(|e| ForgeError::Internal(e.to_string()))?
            .ok_or_else(|| ForgeError::Internal(format!("{dep} output missing for {kind}")))?;
        dependency_outputs.insert(dep, AgentOutput(value));
    }

    let input = AgentInput {
        topic: request.topic.clone(),
        key_points: request.key_points.clone(),
        preferences: request.preferences.clone(),
        dependency_outputs,
    };
    agent.validate_input(&input)?;

    let timeout = Duration::from_secs(cfg.default_task_timeout_secs);
    let output = match tokio::time::timeout(timeout, agent.execute(input, job_ctx)).await {
        Ok(result) => result?,
        Err(_) => return Err(ForgeError::Timeout(format!("{kind} exceeded {timeout:?}"))),
    };

    let key = task_output_key(job_ctx.job_id, kind);
    job_ctx
        .store
        .set(&key, output.as_value().clone(), cfg.output_ttl_secs)
        .await
        .map_err(|e| ForgeError::Internal(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use forge_core::JobId;
    use forge_llm::{GatewayConfig, LlmGateway};
    use forge_store::{InMemoryStateStore, StateStore};
    use tokio_util::sync::CancellationToken;

    use forge_agents::default_agents;

    use crate::types::NodeStatus;

    /// Swaps the default agent for `kind` in `default_agents()` with `agent`,
    /// leaving the other ten wired exactly as `forge_agents::builders` does.
    fn registry_with_override(kind: TaskKind, agent: Arc<dyn Agent>) -> Arc<AgentRegistry> {
        let mut agents = default_agents();
        agents.retain(|a| a.kind() != kind);
        agents.push(agent);
        Arc::new(AgentRegistry::build(agents).unwrap())
    }

    fn ctx(store: Arc<dyn StateStore>, cancellation: CancellationToken) -> JobContext {
        JobContext::new(
            store,
            Arc::new(LlmGateway::new(GatewayConfig::default())),
            Arc::new(HashMap::new()),
            JobId::new(),
            cancellation,
        )
    }

    fn request() -> Arc<ProposalRequest> {
        Arc::new(ProposalRequest {
            topic: "Microgravity effects on cell division".to_string(),
            key_points: vec![],
            preferences: HashMap::new(),
            author: None,
            institution: None,
            department: None,
        })
    }

    /// Fails transiently `fail_count` times, then succeeds with an empty
    /// object. Used to exercise the per-node retry/backoff loop.
    struct FlakyAgent {
        kind: TaskKind,
        fail_count: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Agent for FlakyAgent {
        fn kind(&self) -> TaskKind {
            self.kind
        }
        fn validate_input(&self, _input: &AgentInput) -> Result<(), ForgeError> {
            Ok(())
        }
        async fn execute(
            &self,
            _input: AgentInput,
            _ctx: &JobContext,
        ) -> Result<AgentOutput, ForgeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_count {
                Err(ForgeError::transient("simulated transient failure"))
            } else {
                AgentOutput::new(serde_json::json!({"content": "recovered"})).map_err(ForgeError::from)
            }
        }
    }

    /// Always fails permanently. Used to exercise critical-path cascade.
    struct AlwaysFailAgent {
        kind: TaskKind,
    }

    #[async_trait]
    impl Agent for AlwaysFailAgent {
        fn kind(&self) -> TaskKind {
            self.kind
        }
        fn validate_input(&self, _input: &AgentInput) -> Result<(), ForgeError> {
            Ok(())
        }
        async fn execute(
            &self,
            _input: AgentInput,
            _ctx: &JobContext,
        ) -> Result<AgentOutput, ForgeError> {
            Err(ForgeError::permanent("simulated permanent failure"))
        }
    }

    /// Sleeps long enough to be observed mid-flight by a concurrency probe.
    struct SlowAgent {
        kind: TaskKind,
        millis: u64,
    }

    #[async_trait]
    impl Agent for SlowAgent {
        fn kind(&self) -> TaskKind {
            self.kind
        }
        fn validate_input(&self, _input: &AgentInput) -> Result<(), ForgeError> {
            Ok(())
        }
        async fn execute(
            &self,
            _input: AgentInput,
            _ctx: &JobContext,
        ) -> Result<AgentOutput, ForgeError> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            AgentOutput::new(serde_json::json!({"content": "slow"})).map_err(ForgeError::from)
        }
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_the_retry_budget() {
        let registry = registry_with_override(
            TaskKind::Introduction,
            Arc::new(FlakyAgent { kind: TaskKind::Introduction, fail_count: 2, calls: AtomicU32::new(0) }),
        );
        let config = SchedulerConfig { default_max_retries: 2, ..Default::default() };
        let scheduler = Scheduler::new(registry, config);
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let job_ctx = ctx(store, CancellationToken::new());

        let (graph, outcome) = scheduler.run(request(), job_ctx).await;
        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(graph.node(TaskKind::Introduction).status, NodeStatus::Succeeded);
        assert_eq!(graph.node(TaskKind::Introduction).attempts, 3);
    }

    #[tokio::test]
    async fn permanent_failure_on_the_critical_path_cascades_cancellation() {
        let registry = registry_with_override(
            TaskKind::Methodology,
            Arc::new(AlwaysFailAgent { kind: TaskKind::Methodology }),
        );
        let config = SchedulerConfig { default_max_retries: 1, ..Default::default() };
        let scheduler = Scheduler::new(registry, config);
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let job_ctx = ctx(store, CancellationToken::new());

        let (graph, outcome) = scheduler.run(request(), job_ctx).await;
        match outcome {
            Err(JobError::TaskFailed { kind, .. }) => assert_eq!(kind, TaskKind::Methodology),
            other => panic!("expected TaskFailed, got {other:?}"),
        }
        assert_eq!(graph.node(TaskKind::Methodology).status, NodeStatus::Failed);
        assert_eq!(graph.node(TaskKind::Methodology).attempts, 1, "permanent errors are never retried");
        for kind in [TaskKind::Risk, TaskKind::Optimizer, TaskKind::Visualization, TaskKind::Qa, TaskKind::Formatting, TaskKind::Assembly] {
            assert_eq!(graph.node(kind).status, NodeStatus::Cancelled, "{kind} should be cancelled");
        }
    }

    #[tokio::test]
    async fn dispatch_never_exceeds_max_parallel_tasks() {
        let mut agents = default_agents();
        agents.retain(|a| !matches!(a.kind(), TaskKind::Risk | TaskKind::Optimizer | TaskKind::Visualization));
        agents.push(Arc::new(SlowAgent { kind: TaskKind::Risk, millis: 30 }));
        agents.push(Arc::new(SlowAgent { kind: TaskKind::Optimizer, millis: 30 }));
        agents.push(Arc::new(SlowAgent { kind: TaskKind::Visualization, millis: 30 }));
        let registry = Arc::new(AgentRegistry::build(agents).unwrap());

        let config = SchedulerConfig { max_parallel_tasks: 2, ..Default::default() };
        let peak = Arc::new(AtomicUsize::new(0));
        let peak_for_probe = peak.clone();
        let scheduler = Scheduler::new(registry, config).with_concurrency_probe(Arc::new(move |n| {
            peak_for_probe.fetch_max(n, Ordering::SeqCst);
        }));
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let job_ctx = ctx(store, CancellationToken::new());

        let (graph, outcome) = scheduler.run(request(), job_ctx).await;
        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(graph.is_terminal());
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak concurrency was {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelling_mid_flight_stops_further_dispatch() {
        let registry = registry_with_override(
            TaskKind::Introduction,
            Arc::new(SlowAgent { kind: TaskKind::Introduction, millis: 200 }),
        );
        let scheduler = Scheduler::new(registry, SchedulerConfig::default());
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let cancellation = CancellationToken::new();
        let job_ctx = ctx(store, cancellation.clone());

        let cancel_after = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_after.cancel();
        });

        let (graph, outcome) = scheduler.run(request(), job_ctx).await;
        assert!(matches!(outcome, Err(JobError::Cancelled)));
        assert!(graph.is_terminal());
        assert_ne!(graph.node(TaskKind::Assembly).status, NodeStatus::Succeeded);
    }
}
