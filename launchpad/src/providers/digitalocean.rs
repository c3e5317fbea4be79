//! DigitalOcean droplet provisioner

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::errors::LaunchError;
use crate::http::client::{with_query, HttpClient};
use crate::providers::provisioner::{InstanceInfo, InstanceSpec, InstanceState, ProvisionerClient};

pub const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com/v2";

/// Defaults applied when a deployment does not override them
#[derive(Debug, Clone)]
pub struct DropletDefaults {
    pub region: String,
    pub size: String,
    pub image: String,
    /// SSH key ids or fingerprints installed on every droplet
    pub ssh_keys: Vec<String>,
}

impl Default for DropletDefaults {
    fn default() -> Self {
        Self {
            region: "nyc3".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: "ubuntu-22-04-x64".to_string(),
            ssh_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DropletList {
    droplets: Vec<Droplet>,
}

#[derive(Debug, Deserialize)]
struct Droplet {
    id: u64,
    name: String,
    status: String,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct FirewallList {
    firewalls: Vec<Firewall>,
}

#[derive(Debug, Deserialize)]
struct Firewall {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateDroplet<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: &'a [String],
    tags: &'a [String],
}

impl Droplet {
    fn info(&self) -> InstanceInfo {
        let state = match self.status.as_str() {
            "new" => InstanceState::Pending,
            "active" => InstanceState::Running,
            "off" => InstanceState::Stopped,
            "archive" => InstanceState::Terminated,
            other => InstanceState::Unknown(other.to_string()),
        };
        let address = self
            .networks
            .v4
            .iter()
            .find(|n| n.kind == "public")
            .map(|n| n.ip_address.clone());

        InstanceInfo {
            name: self.name.clone(),
            state,
            address,
        }
    }
}

/// Provisioner backed by the DigitalOcean v2 API
pub struct DigitalOceanProvisioner {
    http: HttpClient,
    defaults: DropletDefaults,
}

impl DigitalOceanProvisioner {
    pub fn new(
        base_url: &str,
        token: SecretString,
        defaults: DropletDefaults,
    ) -> Result<Self, LaunchError> {
        Ok(Self {
            http: HttpClient::new(base_url, token)?,
            defaults,
        })
    }

    async fn find_droplet(&self, name: &str) -> Result<Option<Droplet>, LaunchError> {
        let list: DropletList = self
            .http
            .get(&with_query("/droplets", &[("name", name)]))
            .await
            .map_err(|e| LaunchError::ProvisionError(format!("list droplets: {}", e)))?;
        Ok(list.droplets.into_iter().find(|d| d.name == name))
    }

    async fn find_firewall(&self, name: &str) -> Result<Option<Firewall>, LaunchError> {
        let list: FirewallList = self
            .http
            .get(&with_query("/firewalls", &[("per_page", "200")]))
            .await
            .map_err(|e| LaunchError::ProvisionError(format!("list firewalls: {}", e)))?;
        Ok(list.firewalls.into_iter().find(|f| f.name == name))
    }
}

fn firewall_name(instance: &str) -> String {
    format!("{}-open", instance)
}

#[async_trait]
impl ProvisionerClient for DigitalOceanProvisioner {
    fn name(&self) -> &'static str {
        "digitalocean"
    }

    async fn create_instance(&self, name: &str, spec: &InstanceSpec) -> Result<(), LaunchError> {
        let body = CreateDroplet {
            name,
            region: spec.region.as_deref().unwrap_or(&self.defaults.region),
            size: spec.size.as_deref().unwrap_or(&self.defaults.size),
            image: spec.image.as_deref().unwrap_or(&self.defaults.image),
            ssh_keys: &self.defaults.ssh_keys,
            tags: &spec.tags,
        };
        info!(instance = name, region = body.region, size = body.size, "Creating droplet");

        let _: serde_json::Value = self
            .http
            .post("/droplets", &body)
            .await
            .map_err(|e| LaunchError::ProvisionError(format!("create droplet {}: {}", name, e)))?;
        Ok(())
    }

    async fn describe_instance(&self, name: &str) -> Result<InstanceInfo, LaunchError> {
        self.find_droplet(name)
            .await?
            .map(|d| d.info())
            .ok_or_else(|| LaunchError::ProvisionError(format!("droplet {} not found", name)))
    }

    async fn open_all_network_access(&self, name: &str) -> Result<(), LaunchError> {
        let droplet = self
            .find_droplet(name)
            .await?
            .ok_or_else(|| LaunchError::ProvisionError(format!("droplet {} not found", name)))?;

        let everywhere = json!({ "addresses": ["0.0.0.0/0", "::/0"] });
        let body = json!({
            "name": firewall_name(name),
            "droplet_ids": [droplet.id],
            "inbound_rules": [
                { "protocol": "tcp", "ports": "all", "sources": everywhere },
                { "protocol": "udp", "ports": "all", "sources": everywhere },
                { "protocol": "icmp", "sources": everywhere },
            ],
            "outbound_rules": [
                { "protocol": "tcp", "ports": "all", "destinations": everywhere },
                { "protocol": "udp", "ports": "all", "destinations": everywhere },
                { "protocol": "icmp", "destinations": everywhere },
            ],
        });

        let _: serde_json::Value = self
            .http
            .post("/firewalls", &body)
            .await
            .map_err(|e| LaunchError::ProvisionError(format!("open ports on {}: {}", name, e)))?;
        Ok(())
    }

    async fn delete_instance(&self, name: &str) -> Result<(), LaunchError> {
        if let Some(firewall) = self.find_firewall(&firewall_name(name)).await? {
            self.http
                .delete(&format!("/firewalls/{}", firewall.id))
                .await
                .map_err(|e| LaunchError::ProvisionError(format!("delete firewall: {}", e)))?;
        }

        let Some(droplet) = self.find_droplet(name).await? else {
            debug!(instance = name, "Droplet already gone");
            return Ok(());
        };

        self.http
            .delete(&format!("/droplets/{}", droplet.id))
            .await
            .map_err(|e| LaunchError::ProvisionError(format!("delete droplet {}: {}", name, e)))?;
        info!(instance = name, "Droplet deleted");
        Ok(())
    }
}
