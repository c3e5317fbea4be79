//! Compute instance provisioning contract

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::deploy::naming::normalize_address;
use crate::errors::LaunchError;

/// What to create
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub region: Option<String>,
    pub size: Option<String>,
    pub image: Option<String>,
    pub tags: Vec<String>,
}

/// Lifecycle state reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
    Unknown(String),
}

/// Provider view of one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
    pub state: InstanceState,
    pub address: Option<String>,
}

impl InstanceInfo {
    /// Normalized address, only when the instance is running and has one
    pub fn ready_address(&self) -> Option<String> {
        if self.state != InstanceState::Running {
            return None;
        }
        self.address
            .as_deref()
            .map(normalize_address)
            .filter(|address| !address.is_empty())
    }
}

/// Lifecycle of a compute instance at a cloud provider
#[async_trait]
pub trait ProvisionerClient: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Request a new instance
    async fn create_instance(&self, name: &str, spec: &InstanceSpec) -> Result<(), LaunchError>;

    /// Current state of an instance
    async fn describe_instance(&self, name: &str) -> Result<InstanceInfo, LaunchError>;

    /// Allow all inbound traffic to the instance
    async fn open_all_network_access(&self, name: &str) -> Result<(), LaunchError>;

    /// Destroy an instance
    async fn delete_instance(&self, name: &str) -> Result<(), LaunchError>;

    /// Poll until the instance is running with an address assigned.
    ///
    /// Running without an address, or an address on a non-running instance,
    /// keeps polling. Describe failures count as an attempt. After
    /// `max_attempts` polls the result is [`LaunchError::ReadinessTimeout`].
    async fn wait_until_ready(
        &self,
        name: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<String, LaunchError> {
        let mut last_state = None;

        for attempt in 1..=max_attempts {
            match self.describe_instance(name).await {
                Ok(info) => {
                    if let Some(address) = info.ready_address() {
                        debug!(instance = name, attempt, %address, "Instance is ready");
                        return Ok(address);
                    }
                    debug!(instance = name, attempt, state = ?info.state, "Instance not ready yet");
                    last_state = Some(info.state);
                }
                Err(e) => {
                    warn!(instance = name, attempt, "Failed to describe instance: {}", e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(LaunchError::ReadinessTimeout(format!(
            "instance {} not running with an address after {} attempts (last state: {})",
            name,
            max_attempts,
            last_state.map_or_else(|| "unknown".to_string(), |s| format!("{:?}", s).to_lowercase())
        )))
    }
}
