//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::LaunchError;
use crate::server::handlers::{
    create_deployment_handler, delete_handler, events_handler, force_delete_handler,
    get_deployment_handler, health_handler, list_deployments_handler, redeploy_handler,
    version_handler,
};
use crate::server::state::ServerState;

/// Routes of the launchpad API
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments
        .route(
            "/deployments",
            get(list_deployments_handler).post(create_deployment_handler),
        )
        .route(
            "/deployments/{id}",
            get(get_deployment_handler).delete(delete_handler),
        )
        .route("/deployments/{id}/redeploy", post(redeploy_handler))
        .route("/deployments/{id}/force", delete(force_delete_handler))
        .route("/deployments/{id}/events", get(events_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), LaunchError>>, LaunchError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LaunchError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| LaunchError::ServerError(e.to_string()))
    });

    Ok(handle)
}
