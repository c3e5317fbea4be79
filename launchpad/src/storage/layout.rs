//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::LaunchError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Where launchpad keeps its files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Directory private keys are written to while a connection is open
    pub fn keys_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("keys"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Create the directories launchpad writes to
    pub async fn setup(&self) -> Result<(), LaunchError> {
        self.keys_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("LAUNCHPAD_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".launchpad"))
            })
            .unwrap_or_else(|| PathBuf::from(".launchpad"));

        Self::new(base_dir)
    }
}
