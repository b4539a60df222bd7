use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use forge_agents::AgentRegistry;
use forge_core::{JobId, Proposal, ProposalRequest};
use forge_orchestrator::{JobError, JobFacade, JobStatus};
use forge_store::StateStore;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Shared application state every handler closes over.
pub struct AppState {
    pub facade: Arc<JobFacade>,
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<dyn StateStore>,
}

/// Builds the router: `POST /proposals`, `GET /proposals/{id}`,
/// `GET /health`, `GET /agents`, `GET /status`. No middleware layered on —
/// auth and TLS are out of scope for this surface.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/proposals", post(submit_proposal))
        .route("/proposals/{id}", get(get_proposal))
        .route("/health", get(health))
        .route("/agents", get(agents))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Serialize)]
struct SubmitResponse {
    request_id: String,
    topic: String,
    status: &'static str,
}

async fn submit_proposal(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProposalRequest>,
) -> impl IntoResponse {
    let topic = request.topic.clone();
    match state.facade.submit(request).await {
        Ok(job_id) => {
            let status = match state.facade.status(job_id).await {
                Ok(JobStatus::Completed { .. }) => "completed",
                _ => "in_progress",
            };
            (
                StatusCode::OK,
                Json(SubmitResponse { request_id: job_id.to_string(), topic, status }),
            )
                .into_response()
        }
        Err(JobError::Validation(e)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": e.to_string()}))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to submit proposal");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum ProposalResponse {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed {
        #[serde(flatten)]
        proposal: Box<Proposal>,
    },
    #[serde(rename = "failed")]
    Failed { message: String },
    #[serde(rename = "cancelled")]
    Cancelled,
}

async fn get_proposal(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(job_id) = id.parse::<JobId>() else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "unknown proposal id"}))).into_response();
    };
    match state.facade.status(job_id).await {
        Ok(JobStatus::Pending) => (StatusCode::OK, Json(ProposalResponse::Pending)).into_response(),
        Ok(JobStatus::Running { .. }) => (StatusCode::OK, Json(ProposalResponse::InProgress)).into_response(),
        Ok(JobStatus::Completed { proposal }) => {
            (StatusCode::OK, Json(ProposalResponse::Completed { proposal })).into_response()
        }
        Ok(JobStatus::Failed { message, .. }) => {
            (StatusCode::OK, Json(ProposalResponse::Failed { message })).into_response()
        }
        Ok(JobStatus::Cancelled) => (StatusCode::OK, Json(ProposalResponse::Cancelled)).into_response(),
        Err(JobError::NotFound) => {
            (StatusCode::NOT_FOUND, Json(json!({"error": "unknown proposal id"}))).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "agents_registered": state.registry.len(),
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "agents_registered": state.registry.len(),
                "version": env!("CARGO_PKG_VERSION"),
                "error": e.to_string(),
            })),
        ),
    }
}

async fn agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let kinds: Vec<String> = state.registry.kinds().iter().map(|k| k.as_str().to_string()).collect();
    Json(json!({"count": kinds.len(), "agents": kinds}))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "agents": state.registry.len(),
        "active_workflows": state.facade.active_workflow_count().await,
    }))
}
