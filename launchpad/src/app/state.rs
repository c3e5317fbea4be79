//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::app::options::{AppOptions, ProviderOptions};
use crate::deploy::orchestrator::{Collaborators, WorkflowOrchestrator};
use crate::errors::LaunchError;
use crate::events::bus::EventBus;
use crate::providers::cloudflare::{self, CloudflareDns};
use crate::providers::digitalocean::{self, DigitalOceanProvisioner, DropletDefaults};
use crate::providers::dns::NameRecordClient;
use crate::providers::provisioner::ProvisionerClient;
use crate::providers::remote::RemoteConnector;
use crate::providers::simulated::{SimulatedDns, SimulatedProvisioner, SimulatedRemote};
use crate::providers::ssh::{OpenSshConnector, SshOptions};
use crate::session::store::SessionStore;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{DnsKind, ProvisionerKind};

/// Main application state
pub struct AppState {
    /// Launchpad version
    pub version: String,

    /// Session store shared by workflows, server and sweeper
    pub store: Arc<SessionStore>,

    /// Deployment orchestrator
    pub orchestrator: WorkflowOrchestrator,
}

impl AppState {
    /// Initialize application state
    pub async fn init(version: String, options: &AppOptions) -> Result<Self, LaunchError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let store = Arc::new(SessionStore::new(options.store.clone()));
        let bus = EventBus::new();
        let collaborators = build_collaborators(&options.providers, &options.layout)?;

        let orchestrator = WorkflowOrchestrator::new(
            store.clone(),
            bus,
            collaborators,
            options.workflow.clone(),
        );

        Ok(Self {
            version,
            store,
            orchestrator,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), LaunchError> {
        info!(
            sessions = self.store.len(),
            "Shutting down application state, in-memory sessions are dropped"
        );
        Ok(())
    }
}

/// Build the provisioner, DNS and remote collaborators chosen in the settings
pub fn build_collaborators(
    providers: &ProviderOptions,
    layout: &StorageLayout,
) -> Result<Collaborators, LaunchError> {
    let provisioner: Arc<dyn ProvisionerClient> = match providers.provisioner.kind {
        ProvisionerKind::Simulated => Arc::new(SimulatedProvisioner::default()),
        ProvisionerKind::DigitalOcean => {
            let settings = &providers.provisioner;
            let token = settings.api_token.clone().ok_or_else(|| {
                LaunchError::ConfigError("provisioner.api_token is not set".to_string())
            })?;
            Arc::new(DigitalOceanProvisioner::new(
                settings
                    .base_url
                    .as_deref()
                    .unwrap_or(digitalocean::DEFAULT_BASE_URL),
                token,
                DropletDefaults {
                    region: settings.region.clone(),
                    size: settings.size.clone(),
                    image: settings.image.clone(),
                    ssh_keys: settings.ssh_key_ids.clone(),
                },
            )?)
        }
    };

    let dns: Arc<dyn NameRecordClient> = match providers.dns.kind {
        DnsKind::Simulated => Arc::new(SimulatedDns::new()),
        DnsKind::Cloudflare => {
            let settings = &providers.dns;
            let token = settings.api_token.clone().ok_or_else(|| {
                LaunchError::ConfigError("dns.api_token is not set".to_string())
            })?;
            Arc::new(CloudflareDns::new(
                settings
                    .base_url
                    .as_deref()
                    .unwrap_or(cloudflare::DEFAULT_BASE_URL),
                token,
                settings.zone_id.clone(),
                settings.ttl,
                settings.proxied,
            )?)
        }
    };

    // instances only exist for real when the provisioner is real
    let remote: Arc<dyn RemoteConnector> = match providers.provisioner.kind {
        ProvisionerKind::Simulated => Arc::new(SimulatedRemote::new()),
        ProvisionerKind::DigitalOcean => Arc::new(OpenSshConnector::new(SshOptions {
            user: providers.ssh.user.clone(),
            port: providers.ssh.port,
            connect_timeout: Duration::from_secs(providers.ssh.connect_timeout_secs),
            ssh_binary: providers.ssh.ssh_binary.clone(),
            key_dir: layout.keys_dir(),
        })),
    };

    info!(
        provisioner = provisioner.name(),
        dns = dns.name(),
        "Collaborators ready"
    );

    Ok(Collaborators {
        provisioner,
        dns,
        remote,
    })
}
