#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for stevedore
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`--config`, `<project>/stevedore.toml`, or
//!   `~/.config/stevedore/config.toml`)
//! - Environment variables (`STEVEDORE_*`)
//! - CLI flags (applied by the binary)

pub mod container;

pub use container::{ContainerConfig, NonRepoPolicy, TransferMode};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stevedore_errors::{ConfigError, Error};
use tokio::fs;

/// File name looked up in the project directory
pub const PROJECT_CONFIG_FILE: &str = "stevedore.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Build script used when none is given on the command line
    #[serde(default = "default_script")]
    pub script: PathBuf,
}

/// Command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    /// Applied to steps that set no timeout; 0 means none
    #[serde(default)]
    pub default_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            script: default_script(),
        }
    }
}

fn default_script() -> PathBuf {
    PathBuf::from("build.star")
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("stevedore").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ParseError` for malformed TOML or unknown enum values.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Locate and load the configuration file for a project
    ///
    /// An explicit path must exist. Otherwise `<project>/stevedore.toml` is
    /// used if present, then the user config file, then defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub async fn discover(explicit: Option<&Path>, project: &Path) -> Result<Self, Error> {
        if let Some(path) = explicit {
            return Self::load_from_file(path).await;
        }

        let project_file = project.join(PROJECT_CONFIG_FILE);
        if fs::try_exists(&project_file).await.unwrap_or(false) {
            tracing::debug!(path = %project_file.display(), "using project configuration");
            return Self::load_from_file(&project_file).await;
        }

        if let Ok(user_file) = Self::default_path() {
            if fs::try_exists(&user_file).await.unwrap_or(false) {
                tracing::debug!(path = %user_file.display(), "using user configuration");
                return Self::load_from_file(&user_file).await;
            }
        }

        Ok(Self::default())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` naming the offending variable.
    pub fn merge_env_with<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // STEVEDORE_IMAGE
        if let Some(image) = lookup("STEVEDORE_IMAGE") {
            self.container.image = image;
        }

        // STEVEDORE_RUNTIME
        if let Some(runtime) = lookup("STEVEDORE_RUNTIME") {
            self.container.runtime = runtime;
        }

        // STEVEDORE_WARM
        if let Some(warm) = lookup("STEVEDORE_WARM") {
            self.container.warm = parse_bool("STEVEDORE_WARM", warm)?;
        }

        // STEVEDORE_CONTAINER
        if let Some(enabled) = lookup("STEVEDORE_CONTAINER") {
            self.container.enabled = parse_bool("STEVEDORE_CONTAINER", enabled)?;
        }

        // STEVEDORE_TIMEOUT_MS
        if let Some(timeout) = lookup("STEVEDORE_TIMEOUT_MS") {
            self.execution.default_timeout_ms =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "STEVEDORE_TIMEOUT_MS".to_string(),
                    value: timeout,
                })?;
        }

        Ok(())
    }

    /// Validate the merged configuration
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.container.enabled {
            self.container.validate()?;
        }
        Ok(())
    }

    /// Timeout for steps that do not set one
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.execution.default_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.general.script, PathBuf::from("build.star"));
        assert!(config.container.enabled);
        assert_eq!(config.container.runtime, "docker");
        assert_eq!(config.container.mount_root, "/workspace");
        assert_eq!(config.container.transfer, TransferMode::FileList);
        assert_eq!(config.container.non_repo_policy, NonRepoPolicy::CopyAll);
        assert_eq!(config.default_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn merge_env_with_applies_overrides() {
        let mut config = Config::default();
        config
            .merge_env_with(|key| match key {
                "STEVEDORE_IMAGE" => Some("rust:1.88".into()),
                "STEVEDORE_WARM" => Some("no".into()),
                "STEVEDORE_TIMEOUT_MS" => Some("1500".into()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.container.image, "rust:1.88");
        assert!(!config.container.warm);
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn invalid_bool_names_the_variable() {
        let mut config = Config::default();
        let err = config
            .merge_env_with(|key| (key == "STEVEDORE_CONTAINER").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("STEVEDORE_CONTAINER"));
    }

    #[test]
    fn relative_mount_root_is_rejected_only_when_enabled() {
        let mut config = Config::default();
        config.container.mount_root = "workspace".into();
        assert!(config.validate().is_err());

        config.container.enabled = false;
        assert!(config.validate().is_ok());
    }
}
