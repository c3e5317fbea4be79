//! Remote execution through the system OpenSSH client

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::LaunchError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::providers::remote::{normalize_private_key, CommandOutput, RemoteConnector, RemoteExecutor};
use crate::utils::generate_uuid;

/// OpenSSH client settings
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Login user on the instance
    pub user: String,

    /// SSH port
    pub port: u16,

    /// Connection timeout passed to `ssh -o ConnectTimeout`
    pub connect_timeout: Duration,

    /// Path or name of the `ssh` binary
    pub ssh_binary: String,

    /// Where private keys are materialized while a connection is open
    pub key_dir: Dir,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            connect_timeout: Duration::from_secs(20),
            ssh_binary: "ssh".to_string(),
            key_dir: Dir::new(std::env::temp_dir().join("launchpad-keys")),
        }
    }
}

/// Creates one [`OpenSshExecutor`] per workflow
pub struct OpenSshConnector {
    options: SshOptions,
}

impl OpenSshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

impl RemoteConnector for OpenSshConnector {
    fn executor(&self) -> Box<dyn RemoteExecutor> {
        Box::new(OpenSshExecutor::new(self.options.clone()))
    }
}

struct Target {
    address: String,
    key_file: File,
}

/// Runs each command as its own `ssh` invocation against a fixed target
pub struct OpenSshExecutor {
    options: SshOptions,
    target: Option<Target>,
}

impl OpenSshExecutor {
    pub fn new(options: SshOptions) -> Self {
        Self {
            options,
            target: None,
        }
    }

    fn ssh_args(&self, target: &Target) -> Vec<String> {
        vec![
            "-i".to_string(),
            target.key_file.path().display().to_string(),
            "-p".to_string(),
            self.options.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs().max(1)),
            format!("{}@{}", self.options.user, target.address),
            "--".to_string(),
            "sh -s".to_string(),
        ]
    }

    /// Run `command` on the target. The command is fed to the remote shell on
    /// stdin so it never shows up in the local process list.
    async fn run(&self, target: &Target, command: &str) -> Result<CommandOutput, LaunchError> {
        let spawn_error = |e: std::io::Error| {
            LaunchError::RemoteExecutionError(format!(
                "failed to run {}: {}",
                self.options.ssh_binary, e
            ))
        };

        let mut child = Command::new(&self.options.ssh_binary)
            .args(self.ssh_args(target))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            // a closed pipe shows up as the exit status below
            if let Err(e) = stdin.write_all(format!("{}\n", command).as_bytes()).await {
                debug!("Remote shell closed stdin early: {}", e);
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn write_key(&self, key: &str) -> Result<File, LaunchError> {
        self.options.key_dir.create().await?;
        let key_file = File::new(self.options.key_dir.path().join(format!("{}.pem", generate_uuid())));
        key_file.write_secret(key).await?;
        Ok(key_file)
    }
}

#[async_trait]
impl RemoteExecutor for OpenSshExecutor {
    async fn connect(&mut self, address: &str, private_key: &SecretString) -> Result<(), LaunchError> {
        self.disconnect().await;

        let key = normalize_private_key(private_key.expose_secret())?;
        let target = Target {
            address: address.to_string(),
            key_file: self.write_key(&key).await?,
        };

        // ssh exits with 255 on connection or authentication failure
        let probe = self.run(&target, "true").await;
        match probe {
            Ok(output) if output.success() => {
                info!(%address, user = %self.options.user, "SSH connection established");
                self.target = Some(target);
                Ok(())
            }
            Ok(output) => {
                let _ = target.key_file.delete().await;
                Err(LaunchError::RemoteExecutionError(format!(
                    "ssh to {} failed with exit code {}: {}",
                    address,
                    output.exit_code,
                    output.stderr.trim()
                )))
            }
            Err(e) => {
                let _ = target.key_file.delete().await;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, command: &str) -> Result<CommandOutput, LaunchError> {
        let target = self.target.as_ref().ok_or_else(|| {
            LaunchError::RemoteExecutionError("not connected".to_string())
        })?;
        debug!(address = %target.address, "Running remote command");
        self.run(target, command).await
    }

    async fn disconnect(&mut self) {
        if let Some(target) = self.target.take() {
            if let Err(e) = target.key_file.delete().await {
                warn!("Failed to remove key file {}: {}", target.key_file.path().display(), e);
            }
            debug!(address = %target.address, "SSH connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.target.is_some()
    }
}
