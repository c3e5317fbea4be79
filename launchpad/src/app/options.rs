//! Application configuration options

use std::time::Duration;

use crate::deploy::workflow::WorkflowSettings;
use crate::session::store::StoreSettings;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{DnsSettings, ProvisionerSettings, Settings, SshSettings};
use crate::workers::sweeper;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Workflow timing
    pub workflow: WorkflowSettings,

    /// Session store timing
    pub store: StoreSettings,

    /// Idle sweeper options
    pub sweeper: sweeper::Options,

    /// External collaborators
    pub providers: ProviderOptions,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
            server: ServerOptions::default(),
            workflow: WorkflowSettings::default(),
            store: StoreSettings::default(),
            sweeper: sweeper::Options::default(),
            providers: ProviderOptions::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

impl AppOptions {
    /// Build runtime options from the settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            layout,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            workflow: settings.workflow.workflow_settings(),
            store: settings.workflow.store_settings(),
            sweeper: sweeper::Options {
                interval: settings.workflow.sweep_interval(),
            },
            providers: ProviderOptions {
                provisioner: settings.provisioner.clone(),
                dns: settings.dns.clone(),
                ssh: settings.ssh.clone(),
            },
            ..Default::default()
        }
    }
}

/// Which collaborators to build and how
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub provisioner: ProvisionerSettings,
    pub dns: DnsSettings,
    pub ssh: SshSettings,
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
