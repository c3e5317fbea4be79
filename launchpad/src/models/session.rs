//! Deployment session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::config::DeploymentConfig;

/// Deployment session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Provisioning workflow in progress
    Deploying,

    /// Redeploy workflow in progress
    Redeploying,

    /// Last workflow finished successfully
    Success,

    /// Last workflow failed
    Failed,
}

impl SessionStatus {
    /// Whether a workflow is currently driving this session
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionStatus::Deploying | SessionStatus::Redeploying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Deploying => "deploying",
            SessionStatus::Redeploying => "redeploying",
            SessionStatus::Success => "success",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deploying" => Ok(SessionStatus::Deploying),
            "redeploying" => Ok(SessionStatus::Redeploying),
            "success" => Ok(SessionStatus::Success),
            "failed" => Ok(SessionStatus::Failed),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// Kind of a session log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Command,
    Warning,
    Error,
}

/// One execution record in a session's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,

    pub kind: LogKind,

    pub message: String,

    /// Command as displayed, with secrets redacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            command: None,
            stdout: None,
            stderr: None,
            exit_code: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }
}

/// Authoritative record of one deployment
#[derive(Debug, Clone)]
pub struct DeploymentSession {
    pub id: String,
    pub status: SessionStatus,
    pub resource_name: Option<String>,
    pub address: Option<String>,
    pub hostname: Option<String>,
    pub config: DeploymentConfig,
    pub log_entries: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    /// Set once provisioning first reaches success
    pub provisioned_at: Option<DateTime<Utc>>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl DeploymentSession {
    /// A fresh session at the start of provisioning
    pub fn new(id: String, config: DeploymentConfig) -> Self {
        Self {
            id,
            status: SessionStatus::Deploying,
            resource_name: None,
            address: None,
            hostname: None,
            config,
            log_entries: Vec::new(),
            created_at: Utc::now(),
            provisioned_at: None,
            last_action_at: None,
            error: None,
        }
    }

    /// Whether provisioning ever completed, so the instance outlived its first workflow
    pub fn is_provisioned(&self) -> bool {
        self.provisioned_at.is_some()
    }

    /// Public URL, once a hostname is registered
    pub fn url(&self) -> Option<String> {
        self.hostname.as_ref().map(|h| format!("https://{}", h))
    }

    /// Point-in-time view handed to callers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            resource_name: self.resource_name.clone(),
            address: self.address.clone(),
            hostname: self.hostname.clone(),
            url: self.url(),
            created_at: self.created_at,
            provisioned_at: self.provisioned_at,
            last_action_at: self.last_action_at,
            error: self.error.clone(),
            log_entries: self.log_entries.clone(),
        }
    }
}

/// Serializable view of a session, secrets excluded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub log_entries: Vec<LogEntry>,
}

/// Final result of a successful provisioning or redeploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionInfo {
    pub resource_name: String,
    pub address: String,
    pub hostname: String,
    pub url: String,
}
