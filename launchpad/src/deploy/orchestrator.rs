//! Entry point for starting, tracking and removing deployments

use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::lease::{WorkflowLease, WorkflowLeases};
use crate::deploy::workflow::{Workflow, WorkflowSettings};
use crate::deploy::{provision, redeploy, teardown};
use crate::errors::LaunchError;
use crate::events::bus::{EventBus, Subscription};
use crate::models::config::DeploymentConfig;
use crate::models::event::Event;
use crate::models::session::{CompletionInfo, DeploymentSession, SessionSnapshot, SessionStatus};
use crate::providers::dns::NameRecordClient;
use crate::providers::provisioner::ProvisionerClient;
use crate::providers::remote::RemoteConnector;
use crate::session::fsm::SessionEvent;
use crate::session::store::SessionStore;

/// External systems a workflow talks to
#[derive(Clone)]
pub struct Collaborators {
    pub provisioner: Arc<dyn ProvisionerClient>,
    pub dns: Arc<dyn NameRecordClient>,
    pub remote: Arc<dyn RemoteConnector>,
}

/// Launches workflows in the background and answers questions about them.
///
/// Workflows coordinate only through the session store and the event bus.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<SessionStore>,
    bus: EventBus,
    collaborators: Collaborators,
    leases: WorkflowLeases,
    settings: WorkflowSettings,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        bus: EventBus,
        collaborators: Collaborators,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            bus,
            collaborators,
            leases: WorkflowLeases::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Whether a workflow currently owns `id`
    pub fn is_busy(&self, id: &str) -> bool {
        self.leases.is_active(id)
    }

    fn workflow(&self, id: &str, lease: WorkflowLease) -> Workflow {
        Workflow {
            id: id.to_string(),
            store: self.store.clone(),
            bus: self.bus.clone(),
            provisioner: self.collaborators.provisioner.clone(),
            dns: self.collaborators.dns.clone(),
            remote: self.collaborators.remote.clone(),
            settings: self.settings.clone(),
            _lease: lease,
        }
    }

    fn acquire(&self, id: &str) -> Result<WorkflowLease, LaunchError> {
        self.leases.try_acquire(id).ok_or_else(|| {
            LaunchError::InvalidState(format!("a workflow is already running for {}", id))
        })
    }

    fn session(&self, id: &str) -> Result<DeploymentSession, LaunchError> {
        self.store
            .get(id)
            .ok_or_else(|| LaunchError::SessionNotFound(id.to_string()))
    }

    /// Validate `config`, create its session and start provisioning in the
    /// background. Returns the deployment id without waiting for the workflow.
    pub fn start_provision(
        &self,
        config: DeploymentConfig,
        id: Option<String>,
    ) -> Result<String, LaunchError> {
        config.validate()?;

        let id = self.store.create(config.clone(), id)?;
        let lease = match self.acquire(&id) {
            Ok(lease) => lease,
            Err(e) => {
                self.store.delete(&id);
                return Err(e);
            }
        };

        config.log_summary(&id);
        info!(deployment_id = %id, "Starting provisioning workflow");

        tokio::spawn(provision::run(self.workflow(&id, lease), config));
        Ok(id)
    }

    /// Re-run the update commands on the instance of an existing deployment
    pub fn start_redeploy(&self, id: &str) -> Result<(), LaunchError> {
        let session = self.session(id)?;

        if session.status.is_in_flight() {
            return Err(LaunchError::InvalidState(format!(
                "deployment {} is still {}",
                id, session.status
            )));
        }
        if !session.is_provisioned()
            || session.resource_name.is_none()
            || session.address.is_none()
        {
            return Err(LaunchError::InvalidState(format!(
                "deployment {} was never provisioned successfully",
                id
            )));
        }

        let lease = self.acquire(id)?;
        self.store.transition(id, SessionEvent::Redeploy)?;

        info!(deployment_id = %id, "Starting redeploy workflow");
        tokio::spawn(redeploy::run(self.workflow(id, lease), session));
        Ok(())
    }

    /// Delete the instance and DNS record of a deployment, then the session
    pub fn start_delete(&self, id: &str) -> Result<(), LaunchError> {
        let session = self.session(id)?;

        if session.status.is_in_flight() {
            return Err(LaunchError::InvalidState(format!(
                "deployment {} is still {}",
                id, session.status
            )));
        }
        // a failed first run already rolled its instance back
        if !session.is_provisioned() || session.resource_name.is_none() {
            return Err(LaunchError::InvalidState(format!(
                "deployment {} has no instance to delete, use force delete",
                id
            )));
        }

        let lease = self.acquire(id)?;

        info!(deployment_id = %id, "Starting deletion workflow");
        tokio::spawn(teardown::run(self.workflow(id, lease), session));
        Ok(())
    }

    /// Remove a deployment no matter what state it is in.
    ///
    /// External resources are released best-effort; failures only produce
    /// warnings. The session is always gone afterwards. A workflow still
    /// running for `id` fails at its next store write and rolls back what it
    /// created.
    pub async fn force_delete(&self, id: &str) -> Result<(), LaunchError> {
        let session = self.session(id)?;
        warn!(deployment_id = %id, status = %session.status, "Force deleting deployment");

        if let Some(hostname) = &session.hostname {
            if let Err(e) = self.collaborators.dns.delete_record(hostname).await {
                warn!(deployment_id = %id, %hostname, "Force delete: DNS record not removed: {}", e);
                self.bus.publish(
                    id,
                    Event::warning(format!("Failed to delete DNS record {}: {}", hostname, e)),
                );
            }
        }

        if let Some(name) = &session.resource_name {
            if let Err(e) = self.collaborators.provisioner.delete_instance(name).await {
                warn!(deployment_id = %id, instance = %name, "Force delete: instance not removed: {}", e);
                self.bus.publish(
                    id,
                    Event::warning(format!("Failed to delete instance {}: {}", name, e)),
                );
            }
        }

        self.store.delete(id);
        self.bus.publish(
            id,
            Event::complete(CompletionInfo {
                url: session.url().unwrap_or_default(),
                resource_name: session.resource_name.unwrap_or_default(),
                address: session.address.unwrap_or_default(),
                hostname: session.hostname.unwrap_or_default(),
            }),
        );
        info!(deployment_id = %id, "Deployment force deleted");
        Ok(())
    }

    /// Current snapshot of a deployment
    pub fn status(&self, id: &str) -> Result<SessionSnapshot, LaunchError> {
        self.store.snapshot(id)
    }

    pub fn list_all(&self) -> Vec<SessionSnapshot> {
        self.store.list_all()
    }

    pub fn list_by_status(&self, status: SessionStatus) -> Vec<SessionSnapshot> {
        self.store.list_by_status(status)
    }

    /// Live events of a deployment.
    ///
    /// Starts with `connected`, then a `status` snapshot if the deployment
    /// exists, then everything published afterwards. Unknown ids are allowed
    /// so a caller can subscribe before the deployment is created.
    pub fn stream_events(&self, id: &str) -> Subscription {
        let store = self.store.clone();
        let deployment_id = id.to_string();
        self.bus.subscribe_with(id, move || {
            let mut preamble = vec![Event::connected(deployment_id.as_str())];
            if let Ok(snapshot) = store.snapshot(&deployment_id) {
                preamble.push(Event::status(snapshot));
            }
            preamble
        })
    }
}
