use std::sync::Arc;

use axum::Router;
use forge_agents::AgentRegistry;
use forge_orchestrator::JobFacade;
use forge_store::StateStore;

use crate::router::{self, AppState};

/// Builds the `axum::Router` served by the binary. Holds no state of its
/// own beyond what it hands to [`router::build`].
pub struct GatewayServer;

impl GatewayServer {
    /// Assembles the router over `facade`/`registry`/`store`. The caller
    /// owns binding the listener and calling `axum::serve`.
    pub fn build(facade: Arc<JobFacade>, registry: Arc<AgentRegistry>, store: Arc<dyn StateStore>) -> Router {
        let state = Arc::new(AppState { facade, registry, store });
        router::build(state)
    }
}
