//! DNS record contract

use async_trait::async_trait;

use crate::errors::LaunchError;

/// Manages address records pointing a hostname at an instance
#[async_trait]
pub trait NameRecordClient: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Create a record for `hostname`, returning the canonical name the
    /// provider registered
    async fn create_record(&self, hostname: &str, address: &str) -> Result<String, LaunchError>;

    /// Delete the record for `hostname`. A missing record is not an error.
    async fn delete_record(&self, hostname: &str) -> Result<(), LaunchError>;

    /// Point `hostname` at a new address
    async fn update_record(&self, hostname: &str, address: &str) -> Result<String, LaunchError> {
        self.delete_record(hostname).await?;
        self.create_record(hostname, address).await
    }
}
