//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::LaunchError;
use crate::models::config::DeploymentConfig;
use crate::models::session::{SessionSnapshot, SessionStatus};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for LaunchError {
    fn into_response(self) -> Response {
        let status = match &self {
            LaunchError::ValidationError(_) => StatusCode::BAD_REQUEST,
            LaunchError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            LaunchError::InvalidState(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !self.is_client_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "launchpad".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// New deployment request: the config plus an optional caller-chosen id
#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(flatten)]
    pub config: DeploymentConfig,
}

/// Id of a newly created deployment
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Empty acknowledgement
#[derive(Debug, Default, Serialize)]
pub struct AckResponse {}

/// Start a new deployment
pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<CreateDeploymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, LaunchError> {
    let Json(request) = payload.map_err(|e| LaunchError::ValidationError(e.body_text()))?;
    let id = state
        .orchestrator
        .start_provision(request.config, request.id)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Optional filter of the deployment listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// List deployments, optionally only those with one status
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SessionSnapshot>>, LaunchError> {
    let sessions = match query.status.as_deref() {
        Some(status) => {
            let status: SessionStatus = status.parse().map_err(LaunchError::ValidationError)?;
            state.orchestrator.list_by_status(status)
        }
        None => state.orchestrator.list_all(),
    };
    Ok(Json(sessions))
}

/// Current state of one deployment
pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, LaunchError> {
    Ok(Json(state.orchestrator.status(&id)?))
}

/// Redeploy the latest source onto the existing instance
pub async fn redeploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LaunchError> {
    state.orchestrator.start_redeploy(&id)?;
    Ok((StatusCode::ACCEPTED, Json(AckResponse::default())))
}

/// Tear a deployment down in the background
pub async fn delete_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LaunchError> {
    state.orchestrator.start_delete(&id)?;
    Ok((StatusCode::ACCEPTED, Json(AckResponse::default())))
}

/// Remove a deployment right away, whatever its state
pub async fn force_delete_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LaunchError> {
    state.orchestrator.force_delete(&id).await?;
    Ok(Json(AckResponse::default()))
}

/// Server-sent events of one deployment, until the client goes away or the
/// server shuts down
pub async fn events_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    debug!(deployment_id = %id, "Event stream opened");

    let mut shutdown = state.shutdown.subscribe();
    let stopped = async move {
        let _ = shutdown.recv().await;
    };

    let stream = state
        .orchestrator
        .stream_events(&id)
        .take_until(stopped)
        .filter_map(|event| async move {
            match SseEvent::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    error!("Failed to encode event: {}", e);
                    None
                }
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
