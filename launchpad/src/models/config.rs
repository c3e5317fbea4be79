//! Deployment configuration models

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deploy::naming::{derive_repository_name, is_dns_label, sanitize_label};
use crate::errors::LaunchError;
use crate::providers::remote::normalize_private_key;
use crate::utils::secret;

/// Everything needed to provision, configure and publish one deployment.
///
/// Owned by exactly one session once the deployment has been created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Source repository, `https://host/org/repo(.git)` or `git@host:org/repo.git`
    #[serde(default)]
    pub repository_url: String,

    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Project name, derived from the repository when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Compute instance name, derived from the repository when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,

    /// DNS zone the hostname is registered under
    #[serde(default)]
    pub domain: String,

    /// Leftmost hostname label, the instance name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,

    /// Port the application listens on behind the reverse proxy
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// Optional dependency install step run inside the checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,

    /// Command the service unit runs
    #[serde(default = "default_start_command")]
    pub start_command: String,

    /// Provider region override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Provider instance size override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Provider image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Secret material, never serialized
    #[serde(default, skip_serializing)]
    pub credentials: Credentials,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_app_port() -> u16 {
    3000
}

fn default_start_command() -> String {
    "npm start".to_string()
}

/// Secret material attached to a deployment
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Private key used to reach the instance over SSH
    #[serde(deserialize_with = "secret::deserialize")]
    pub ssh_private_key: SecretString,

    /// Token for cloning private repositories over https
    #[serde(default, deserialize_with = "secret::deserialize_opt")]
    pub repository_token: Option<SecretString>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            ssh_private_key: SecretString::from(String::new()),
            repository_token: None,
        }
    }
}

impl DeploymentConfig {
    /// Create a config with defaults for everything but the essentials
    pub fn new(
        repository_url: impl Into<String>,
        domain: impl Into<String>,
        ssh_private_key: impl Into<String>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            branch: default_branch(),
            project_name: None,
            instance_name: None,
            domain: domain.into(),
            subdomain: None,
            app_port: default_app_port(),
            install_command: None,
            start_command: default_start_command(),
            region: None,
            size: None,
            image: None,
            credentials: Credentials {
                ssh_private_key: SecretString::from(ssh_private_key.into()),
                repository_token: None,
            },
        }
    }

    /// Name of the compute instance
    pub fn resource_name(&self) -> String {
        match self.instance_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_lowercase(),
            _ => sanitize_label(&derive_repository_name(&self.repository_url)),
        }
    }

    /// Name of the project, also used for the checkout directory and service unit
    pub fn project_name(&self) -> String {
        match self.project_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => sanitize_label(name),
            _ => sanitize_label(&derive_repository_name(&self.repository_url)),
        }
    }

    /// Fully qualified hostname requested for the instance
    pub fn requested_hostname(&self) -> String {
        let label = match self.subdomain.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => sub.to_lowercase(),
            _ => self.resource_name(),
        };
        format!("{}.{}", label, self.domain.trim().trim_end_matches('.').to_lowercase())
    }

    /// Check the config before any workflow is started
    pub fn validate(&self) -> Result<(), LaunchError> {
        let repo = self.repository_url.trim();
        if repo.is_empty() {
            return Err(LaunchError::ValidationError(
                "repository_url is required".to_string(),
            ));
        }
        if !(repo.starts_with("https://") || repo.starts_with("http://") || repo.starts_with("git@"))
        {
            return Err(LaunchError::ValidationError(format!(
                "repository_url must be an http(s) or git@ reference: {}",
                repo
            )));
        }

        if self.branch.trim().is_empty() {
            return Err(LaunchError::ValidationError("branch must not be empty".to_string()));
        }

        let domain = self.domain.trim().trim_end_matches('.');
        if domain.is_empty() || !domain.contains('.') {
            return Err(LaunchError::ValidationError(format!(
                "domain must be a DNS zone such as example.com: '{}'",
                self.domain
            )));
        }

        let resource_name = self.resource_name();
        if !is_dns_label(&resource_name) {
            return Err(LaunchError::ValidationError(format!(
                "instance name must be a DNS label (a-z, 0-9, '-', max 63 chars): '{}'",
                resource_name
            )));
        }

        if let Some(sub) = self.subdomain.as_deref().map(str::trim) {
            if !sub.is_empty() && !sub.split('.').all(|label| is_dns_label(&label.to_lowercase())) {
                return Err(LaunchError::ValidationError(format!(
                    "subdomain is not a valid DNS name: '{}'",
                    sub
                )));
            }
        }

        if self.app_port == 0 {
            return Err(LaunchError::ValidationError("app_port must be non-zero".to_string()));
        }

        if self.start_command.trim().is_empty() {
            return Err(LaunchError::ValidationError(
                "start_command must not be empty".to_string(),
            ));
        }

        normalize_private_key(self.credentials.ssh_private_key.expose_secret())
            .map_err(|e| LaunchError::ValidationError(format!("ssh_private_key: {}", e)))?;

        Ok(())
    }

    /// Log the config without exposing any secret
    pub fn log_summary(&self, deployment_id: &str) {
        info!(
            deployment_id,
            repository_url = %self.repository_url,
            branch = %self.branch,
            resource_name = %self.resource_name(),
            hostname = %self.requested_hostname(),
            ssh_key_set = !self.credentials.ssh_private_key.expose_secret().trim().is_empty(),
            repository_token_set = self.credentials.repository_token.is_some(),
            "Deployment configuration accepted"
        );
    }
}
