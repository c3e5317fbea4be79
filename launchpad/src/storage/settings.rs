//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::deploy::workflow::WorkflowSettings;
use crate::errors::LaunchError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::session::store::StoreSettings;
use crate::utils::secret;

/// Launchpad settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Workflow timing
    #[serde(default)]
    pub workflow: WorkflowTiming,

    /// Compute provider
    #[serde(default)]
    pub provisioner: ProvisionerSettings,

    /// DNS provider
    #[serde(default)]
    pub dns: DnsSettings,

    /// SSH client
    #[serde(default)]
    pub ssh: SshSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            workflow: WorkflowTiming::default(),
            provisioner: ProvisionerSettings::default(),
            dns: DnsSettings::default(),
            ssh: SshSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it does not exist
    pub async fn load(file: &File) -> Result<Self, LaunchError> {
        if !file.exists().await {
            info!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }

        let settings: Settings = file
            .read_json()
            .await
            .map_err(|e| LaunchError::ConfigError(format!("{}: {}", file.path().display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the chosen providers have what they need
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.provisioner.kind == ProvisionerKind::DigitalOcean
            && !is_set(&self.provisioner.api_token)
        {
            return Err(LaunchError::ConfigError(
                "provisioner.api_token is required for digitalocean".to_string(),
            ));
        }
        if self.dns.kind == DnsKind::Cloudflare {
            if !is_set(&self.dns.api_token) {
                return Err(LaunchError::ConfigError(
                    "dns.api_token is required for cloudflare".to_string(),
                ));
            }
            if self.dns.zone_id.trim().is_empty() {
                return Err(LaunchError::ConfigError(
                    "dns.zone_id is required for cloudflare".to_string(),
                ));
            }
        }
        if self.workflow.ready_max_attempts == 0 {
            return Err(LaunchError::ConfigError(
                "workflow.ready_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the effective settings, secrets reduced to whether they are set
    pub fn log_summary(&self) {
        info!(
            log_level = self.log_level.to_filter_string(),
            server = %format!("{}:{}", self.server.host, self.server.port),
            provisioner = ?self.provisioner.kind,
            provisioner_token_set = is_set(&self.provisioner.api_token),
            dns = ?self.dns.kind,
            dns_token_set = is_set(&self.dns.api_token),
            ssh_user = %self.ssh.user,
            "Settings loaded"
        );
    }
}

fn is_set(secret: &Option<SecretString>) -> bool {
    secret
        .as_ref()
        .is_some_and(|s| !s.expose_secret().trim().is_empty())
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Workflow and session timing, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowTiming {
    #[serde(default = "default_ready_poll_interval")]
    pub ready_poll_interval_secs: u64,

    #[serde(default = "default_ready_max_attempts")]
    pub ready_max_attempts: u32,

    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    #[serde(default = "default_removal_grace")]
    pub removal_grace_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ready_poll_interval() -> u64 {
    5
}

fn default_ready_max_attempts() -> u32 {
    24
}

fn default_settle_delay() -> u64 {
    30
}

fn default_removal_grace() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for WorkflowTiming {
    fn default() -> Self {
        Self {
            ready_poll_interval_secs: default_ready_poll_interval(),
            ready_max_attempts: default_ready_max_attempts(),
            settle_delay_secs: default_settle_delay(),
            removal_grace_secs: default_removal_grace(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl WorkflowTiming {
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            ready_poll_interval: Duration::from_secs(self.ready_poll_interval_secs),
            ready_max_attempts: self.ready_max_attempts,
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            removal_grace: Duration::from_secs(self.removal_grace_secs),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Which compute provider to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerKind {
    #[default]
    Simulated,
    DigitalOcean,
}

/// Compute provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionerSettings {
    #[serde(default)]
    pub kind: ProvisionerKind,

    #[serde(default, deserialize_with = "secret::deserialize_opt")]
    pub api_token: Option<SecretString>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default = "default_image")]
    pub image: String,

    /// Provider SSH key ids installed on every instance
    #[serde(default)]
    pub ssh_key_ids: Vec<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_region() -> String {
    "nyc3".to_string()
}

fn default_size() -> String {
    "s-1vcpu-1gb".to_string()
}

fn default_image() -> String {
    "ubuntu-22-04-x64".to_string()
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            kind: ProvisionerKind::default(),
            api_token: None,
            region: default_region(),
            size: default_size(),
            image: default_image(),
            ssh_key_ids: Vec::new(),
            base_url: None,
        }
    }
}

/// Which DNS provider to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsKind {
    #[default]
    Simulated,
    Cloudflare,
}

/// DNS provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct DnsSettings {
    #[serde(default)]
    pub kind: DnsKind,

    #[serde(default, deserialize_with = "secret::deserialize_opt")]
    pub api_token: Option<SecretString>,

    #[serde(default)]
    pub zone_id: String,

    /// Route traffic through the provider's proxy
    #[serde(default = "default_true")]
    pub proxied: bool,

    /// Record TTL in seconds; 1 means automatic
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_ttl() -> u32 {
    1
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            kind: DnsKind::default(),
            api_token: None,
            zone_id: String::new(),
            proxied: true,
            ttl: default_ttl(),
            base_url: None,
        }
    }
}

/// SSH client settings
#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    20
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            ssh_binary: default_ssh_binary(),
        }
    }
}
