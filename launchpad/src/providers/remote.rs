//! Remote command execution contract

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::LaunchError;

/// Result of one remote command. A non-zero exit is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A connection to one remote host
#[async_trait]
pub trait RemoteExecutor: Send {
    /// Connect to `address` authenticating with `private_key`.
    ///
    /// The key is normalized with [`normalize_private_key`] first.
    async fn connect(&mut self, address: &str, private_key: &SecretString) -> Result<(), LaunchError>;

    /// Run a command to completion
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, LaunchError>;

    /// Close the connection. Safe to call when not connected.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// Hands out a fresh executor per workflow
pub trait RemoteConnector: Send + Sync {
    fn executor(&self) -> Box<dyn RemoteExecutor>;
}

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
const PRIVATE_KEY_MARKER: &str = "PRIVATE KEY-----";

/// Bring private key material into canonical PEM form.
///
/// Keys pasted through JSON or environment variables often arrive wrapped in
/// quotes or with literal `\n` sequences instead of line breaks.
pub fn normalize_private_key(raw: &str) -> Result<String, LaunchError> {
    let mut key = raw.trim();

    for quote in ['"', '\''] {
        if key.len() >= 2 && key.starts_with(quote) && key.ends_with(quote) {
            key = key[1..key.len() - 1].trim();
            break;
        }
    }

    let key = key
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n");

    let lines: Vec<&str> = key
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
        return Err(LaunchError::RemoteExecutionError(
            "private key is empty".to_string(),
        ));
    };

    let is_pem = lines.len() >= 2
        && first.starts_with(PEM_BEGIN)
        && first.ends_with(PRIVATE_KEY_MARKER)
        && last.starts_with(PEM_END)
        && last.ends_with(PRIVATE_KEY_MARKER)
        && first[PEM_BEGIN.len()..] == last[PEM_END.len()..];

    if !is_pem {
        return Err(LaunchError::RemoteExecutionError(
            "private key is not in PEM format".to_string(),
        ));
    }

    let mut normalized = lines.join("\n");
    normalized.push('\n');
    Ok(normalized)
}
