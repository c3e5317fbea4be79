//! Shared context and reporting helpers for a running workflow

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::deploy::commands::RemoteCommand;
use crate::deploy::lease::WorkflowLease;
use crate::errors::LaunchError;
use crate::events::bus::EventBus;
use crate::models::event::Event;
use crate::models::session::{LogEntry, LogKind};
use crate::providers::dns::NameRecordClient;
use crate::providers::provisioner::ProvisionerClient;
use crate::providers::remote::{RemoteConnector, RemoteExecutor};
use crate::session::fsm::SessionEvent;
use crate::session::store::SessionStore;

/// Timing of the workflow steps
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Delay between instance readiness polls
    pub ready_poll_interval: Duration,

    /// Readiness polls before giving up
    pub ready_max_attempts: u32,

    /// Pause after opening network access, before the first SSH connection
    pub settle_delay: Duration,

    /// How long a deleted session stays visible so the final event can be read
    pub removal_grace: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            ready_poll_interval: Duration::from_secs(5),
            ready_max_attempts: 24,
            settle_delay: Duration::from_secs(30),
            removal_grace: Duration::from_secs(5),
        }
    }
}

/// Everything a single workflow run needs. Owns the deployment's lease for
/// as long as it lives.
pub(crate) struct Workflow {
    pub id: String,
    pub store: Arc<SessionStore>,
    pub bus: EventBus,
    pub provisioner: Arc<dyn ProvisionerClient>,
    pub dns: Arc<dyn NameRecordClient>,
    pub remote: Arc<dyn RemoteConnector>,
    pub settings: WorkflowSettings,
    pub _lease: WorkflowLease,
}

impl Workflow {
    /// Report a milestone. Fails once the session is gone.
    pub fn progress(&self, message: impl Into<String>) -> Result<(), LaunchError> {
        let message = message.into();
        info!(deployment_id = %self.id, "{}", message);
        self.store.append_log(&self.id, LogEntry::info(&message))?;
        self.bus.publish(&self.id, Event::progress(message));
        Ok(())
    }

    /// Report a milestone whether or not the session still exists
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        info!(deployment_id = %self.id, "{}", message);
        let _ = self.store.append_log(&self.id, LogEntry::info(&message));
        self.bus.publish(&self.id, Event::progress(message));
    }

    /// Report a non-fatal problem. Never fails.
    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(deployment_id = %self.id, "{}", message);
        let _ = self.store.append_log(&self.id, LogEntry::warning(&message));
        self.bus.publish(&self.id, Event::warning(message));
    }

    /// Run a plan of remote commands in order.
    ///
    /// A command exiting non-zero is recorded as a warning and the plan
    /// continues; only transport failures abort it.
    pub async fn run_commands(
        &self,
        executor: &mut dyn RemoteExecutor,
        commands: &[RemoteCommand],
    ) -> Result<(), LaunchError> {
        let total = commands.len();
        for (index, command) in commands.iter().enumerate() {
            self.progress(format!("[{}/{}] {}...", index + 1, total, command.description))?;

            let output = executor.execute(&command.command).await?;

            let kind = if output.success() {
                LogKind::Command
            } else {
                LogKind::Warning
            };
            let message = if output.success() {
                format!("{} completed", command.description)
            } else {
                format!(
                    "{} exited with code {}",
                    command.description, output.exit_code
                )
            };

            let mut entry = LogEntry::new(kind, message);
            entry.command = Some(command.display.clone());
            entry.stdout = Some(output.stdout);
            entry.stderr = Some(output.stderr);
            entry.exit_code = Some(output.exit_code);

            if kind == LogKind::Warning {
                warn!(deployment_id = %self.id, "{}", entry.message);
            }

            self.store.append_log(&self.id, entry.clone())?;
            self.bus.publish(&self.id, Event::log(entry));
        }
        Ok(())
    }

    /// Record a terminal failure: error log entry, `failed` status, error event
    pub fn fail(&self, err: &LaunchError) {
        let message = err.to_string();
        error!(deployment_id = %self.id, "Workflow failed: {}", message);

        let _ = self.store.append_log(&self.id, LogEntry::error(&message));
        if let Err(e) = self
            .store
            .transition(&self.id, SessionEvent::Failed(message.clone()))
        {
            warn!(deployment_id = %self.id, "Could not mark deployment failed: {}", e);
        }
        self.bus.publish(&self.id, Event::error(message));
    }
}
