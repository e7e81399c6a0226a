#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for stevedore
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so failures can be captured in step
//! results and replayed to event consumers.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod container;
pub mod execution;
pub mod script;
pub mod workflow;

// Re-export all error types at the root
pub use config::ConfigError;
pub use container::ContainerError;
pub use execution::ExecutionError;
pub use script::{Diagnostic, ScriptError};
pub use workflow::WorkflowError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for stevedore operations
pub type Result<T> = std::result::Result<T, Error>;

/// How an error is presented on the command line and in step failure events
pub trait UserFacingError {
    /// One-line message for the user
    fn user_message(&self) -> Cow<'_, str>;

    /// What the user can do about it
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Running the same build again may succeed
    fn is_retryable(&self) -> bool {
        false
    }

    /// Dotted code such as `script.compile`, stable across releases
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Script(err) => err.user_message(),
            Error::Container(err) => err.user_message(),
            Error::Workflow(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Script(err) => err.user_hint(),
            Error::Execution(err) => err.user_hint(),
            Error::Container(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::Workflow(err) => err.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Execution(err) => err.is_retryable(),
            Error::Container(err) => err.is_retryable(),
            Error::Io { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Script(err) => err.user_code(),
            Error::Execution(err) => err.user_code(),
            Error::Container(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Workflow(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
