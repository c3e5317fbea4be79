//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::LaunchError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::session::store::SessionStore;
use crate::workers::sweeper;

/// Run launchpad until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LaunchError> {
    info!("Initializing launchpad...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.max_shutdown_delay);

    if let Err(e) = init(version, &options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start launchpad: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    version: String,
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), LaunchError> {
    let app_state = Arc::new(AppState::init(version, options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_sweeper_worker(
        options.sweeper.clone(),
        app_state.store.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_server(options, app_state, shutdown_manager, shutdown_tx).await?;

    Ok(())
}

fn init_sweeper_worker(
    options: sweeper::Options,
    store: Arc<SessionStore>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), LaunchError> {
    info!("Initializing session sweeper...");

    let handle = tokio::spawn(async move {
        sweeper::run(
            &options,
            store,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_sweeper_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), LaunchError> {
    info!("Initializing HTTP server...");

    let mut shutdown_rx = shutdown_tx.subscribe();
    let server_state = ServerState::new(app_state.orchestrator.clone(), shutdown_tx);

    let handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), LaunchError>>>,
    sweeper_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            app_state: None,
            server_handle: None,
            sweeper_handle: None,
        }
    }

    fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), LaunchError> {
        if self.app_state.is_some() {
            return Err(LaunchError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    fn with_sweeper_handle(&mut self, handle: JoinHandle<()>) -> Result<(), LaunchError> {
        if self.sweeper_handle.is_some() {
            return Err(LaunchError::ShutdownError("sweeper_handle already set".to_string()));
        }
        self.sweeper_handle = Some(handle);
        Ok(())
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), LaunchError>>,
    ) -> Result<(), LaunchError> {
        if self.server_handle.is_some() {
            return Err(LaunchError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), LaunchError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), LaunchError> {
        info!("Shutting down launchpad...");

        // 1. HTTP server, so no new workflows start
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| LaunchError::ShutdownError(e.to_string()))??;
        }

        // 2. Sweeper
        if let Some(handle) = self.sweeper_handle.take() {
            handle
                .await
                .map_err(|e| LaunchError::ShutdownError(e.to_string()))?;
        }

        // 3. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
