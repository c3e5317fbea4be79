//! Server state

use tokio::sync::broadcast;

use crate::deploy::orchestrator::WorkflowOrchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: WorkflowOrchestrator,

    /// Fires once when the process shuts down; long-lived responses end on it
    pub shutdown: broadcast::Sender<()>,
}

impl ServerState {
    pub fn new(orchestrator: WorkflowOrchestrator, shutdown: broadcast::Sender<()>) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }
}
