//! Container section of the configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stevedore_errors::ConfigError;

/// How project files reach the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Stream the file list to a `tar` pipeline reading from a read-only bind mount
    #[default]
    FileList,
    /// Build the archive on the host and stream it into the container
    Archive,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileList => f.write_str("file_list"),
            Self::Archive => f.write_str("archive"),
        }
    }
}

impl FromStr for TransferMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_list" | "file-list" => Ok(Self::FileList),
            "archive" => Ok(Self::Archive),
            other => Err(ConfigError::InvalidValue {
                field: "container.transfer".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// What to sync when the project directory is not a git work tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonRepoPolicy {
    /// Copy every file under the project directory
    #[default]
    CopyAll,
    /// Refuse to start the container
    Fail,
}

/// Container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Runtime binary; anything speaking the docker CLI dialect
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Where the project is materialised inside the container
    #[serde(default = "default_mount_root")]
    pub mount_root: String,
    /// Where the host project is bind-mounted read-only
    #[serde(default = "default_source_mount")]
    pub source_mount: String,
    /// Keep the container between runs and reuse it
    #[serde(default = "default_warm")]
    pub warm: bool,
    #[serde(default)]
    pub transfer: TransferMode,
    #[serde(default)]
    pub non_repo_policy: NonRepoPolicy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            runtime: default_runtime(),
            image: default_image(),
            mount_root: default_mount_root(),
            source_mount: default_source_mount(),
            warm: default_warm(),
            transfer: TransferMode::default(),
            non_repo_policy: NonRepoPolicy::default(),
        }
    }
}

impl ContainerConfig {
    /// Check the values a container cannot be created without
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for an empty image or runtime, a relative
    /// mount path, or a source mount equal to the mount root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() {
            return Err(invalid("container.image", &self.image));
        }
        if self.runtime.trim().is_empty() {
            return Err(invalid("container.runtime", &self.runtime));
        }
        if !self.mount_root.starts_with('/') || self.mount_root.len() < 2 {
            return Err(invalid("container.mount_root", &self.mount_root));
        }
        if !self.source_mount.starts_with('/')
            || self.source_mount.trim_end_matches('/') == self.mount_root.trim_end_matches('/')
        {
            return Err(invalid("container.source_mount", &self.source_mount));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn default_enabled() -> bool {
    true
}

fn default_runtime() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "debian:bookworm-slim".to_string()
}

fn default_mount_root() -> String {
    "/workspace".to_string()
}

fn default_source_mount() -> String {
    "/mnt/stevedore-src".to_string()
}

fn default_warm() -> bool {
    true
}
