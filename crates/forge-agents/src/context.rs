use std::collections::HashMap;
use std::sync::Arc;

use forge_core::JobId;
use forge_llm::LlmGateway;
use forge_sources::SourceConnector;
use forge_store::StateStore;
use tokio_util::sync::CancellationToken;

/// Everything an agent needs to do its work, bundled explicitly rather than
/// reached through globals: the state store, the LLM gateway, the
/// configured source connectors, which job this invocation belongs to, and a
/// token to observe at suspension points if the job is cancelled mid-flight.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn StateStore>,
    pub llm: Arc<LlmGateway>,
    pub sources: Arc<HashMap<String, Arc<dyn SourceConnector>>>,
    pub job_id: JobId,
    pub cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(
        store: Arc<dyn StateStore>,
        llm: Arc<LlmGateway>,
        sources: Arc<HashMap<String, Arc<dyn SourceConnector>>>,
        job_id: JobId,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            store,
            llm,
            sources,
            job_id,
            cancellation,
        }
    }
}
