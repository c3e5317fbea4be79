//! Error types for launchpad

use thiserror::Error;

/// Main error type for launchpad
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Provision error: {0}")]
    ProvisionError(String),

    #[error("Instance not ready: {0}")]
    ReadinessTimeout(String),

    #[error("Remote execution error: {0}")]
    RemoteExecutionError(String),

    #[error("Name record error: {0}")]
    NameRecordError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LaunchError {
    /// Whether the error was caused by the caller's request rather than a
    /// failure of launchpad or one of its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LaunchError::ValidationError(_)
                | LaunchError::SessionNotFound(_)
                | LaunchError::InvalidState(_)
        )
    }
}
