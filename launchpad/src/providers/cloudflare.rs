//! Cloudflare DNS records

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::LaunchError;
use crate::http::client::{with_query, HttpClient};
use crate::providers::dns::NameRecordClient;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<T> ApiResponse<T> {
    fn into_result(self, action: &str) -> Result<Option<T>, LaunchError> {
        if self.success {
            return Ok(self.result);
        }
        let detail = self
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join(", ");
        Err(LaunchError::NameRecordError(format!("{}: {}", action, detail)))
    }
}

/// A-record management in one Cloudflare zone
pub struct CloudflareDns {
    http: HttpClient,
    zone_id: String,
    ttl: u32,
    proxied: bool,
}

impl CloudflareDns {
    pub fn new(
        base_url: &str,
        token: SecretString,
        zone_id: impl Into<String>,
        ttl: u32,
        proxied: bool,
    ) -> Result<Self, LaunchError> {
        Ok(Self {
            http: HttpClient::new(base_url, token)?,
            zone_id: zone_id.into(),
            ttl,
            proxied,
        })
    }

    async fn find_records(&self, hostname: &str) -> Result<Vec<DnsRecord>, LaunchError> {
        let response: ApiResponse<Vec<DnsRecord>> = self
            .http
            .get(&with_query(
                &format!("/zones/{}/dns_records", self.zone_id),
                &[("type", "A"), ("name", hostname)],
            ))
            .await
            .map_err(|e| LaunchError::NameRecordError(format!("lookup {}: {}", hostname, e)))?;
        Ok(response.into_result("lookup")?.unwrap_or_default())
    }
}

#[async_trait]
impl NameRecordClient for CloudflareDns {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn create_record(&self, hostname: &str, address: &str) -> Result<String, LaunchError> {
        let body = NewRecord {
            kind: "A",
            name: hostname,
            content: address,
            ttl: self.ttl,
            proxied: self.proxied,
        };

        let response: ApiResponse<DnsRecord> = self
            .http
            .post(&format!("/zones/{}/dns_records", self.zone_id), &body)
            .await
            .map_err(|e| LaunchError::NameRecordError(format!("create {}: {}", hostname, e)))?;

        let record = response.into_result("create")?.ok_or_else(|| {
            LaunchError::NameRecordError(format!("create {}: empty response", hostname))
        })?;
        info!(hostname = %record.name, %address, "DNS record created");
        Ok(record.name)
    }

    async fn delete_record(&self, hostname: &str) -> Result<(), LaunchError> {
        let records = self.find_records(hostname).await?;
        if records.is_empty() {
            debug!(hostname, "No DNS record to delete");
            return Ok(());
        }

        for record in records {
            self.http
                .delete(&format!("/zones/{}/dns_records/{}", self.zone_id, record.id))
                .await
                .map_err(|e| LaunchError::NameRecordError(format!("delete {}: {}", hostname, e)))?;
            info!(hostname = %record.name, "DNS record deleted");
        }
        Ok(())
    }
}
