#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for stevedore
//!
//! This crate provides the value types shared by the executors, the
//! workflow runner and the script host: command options and results,
//! single-assignment deferred values, and project handles.

pub mod command;
pub mod deferred;
pub mod project;

pub use command::{CommandOptions, CommandResult, TIMEOUT_EXIT_CODE};
pub use deferred::{Deferred, DeferredState, DeferredValue};
pub use project::ProjectDir;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity for log-only steps and general messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Error returned when a log level string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected debug, info, warning or error)")]
pub struct ParseLogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

/// Where a step's command ultimately runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Local,
    Container,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Container => f.write_str("container"),
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = stevedore_errors::ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" | "host" => Ok(Self::Local),
            "container" => Ok(Self::Container),
            other => Err(stevedore_errors::ScriptError::UnknownExecutor {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parses_aliases() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn executor_kind_rejects_unknown_names() {
        assert_eq!("container".parse::<ExecutorKind>().unwrap(), ExecutorKind::Container);
        assert!(matches!(
            "vm".parse::<ExecutorKind>(),
            Err(stevedore_errors::ScriptError::UnknownExecutor { .. })
        ));
    }
}
