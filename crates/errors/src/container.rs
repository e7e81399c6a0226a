//! Container lifecycle error types

use std::borrow::Cow;

use crate::{ExecutionError, UserFacingError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("container runtime '{runtime}' is not available: {message}")]
    RuntimeUnavailable { runtime: String, message: String },

    #[error("failed to create container from {image}: {message}")]
    CreateFailed { image: String, message: String },

    #[error("container command failed: {command} - {message}")]
    ExecFailed { command: String, message: String },

    #[error("failed to compute file snapshot of {path}: {message}")]
    SnapshotFailed { path: String, message: String },

    #[error("{path} is not a git repository and the non-repository policy is 'fail'")]
    NotARepository { path: String },

    #[error("file transfer into {container} failed: {message}")]
    TransferFailed { container: String, message: String },

    #[error("failed to probe archive tool in {container}: {message}")]
    ProbeFailed { container: String, message: String },
}

impl From<ExecutionError> for ContainerError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::SpawnFailed { command, message }
            | ExecutionError::Io { command, message } => {
                ContainerError::ExecFailed { command, message }
            }
            ExecutionError::CommandNotFound { command } => ContainerError::RuntimeUnavailable {
                runtime: command,
                message: "not found on PATH".to_string(),
            },
            other => ContainerError::ExecFailed {
                command: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl UserFacingError for ContainerError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RuntimeUnavailable { .. } => {
                Some("Start the container runtime (docker/podman) or run with --local.")
            }
            Self::CreateFailed { .. } => {
                Some("Check that the configured image exists and can be pulled.")
            }
            Self::NotARepository { .. } => Some(
                "Initialise a git repository or set container.non_repo_policy = \"copy_all\".",
            ),
            Self::TransferFailed { .. } | Self::ProbeFailed { .. } => {
                Some("The image needs a working `tar` and `sh`; retry with --cold after fixing it.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecFailed { .. } | Self::TransferFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::RuntimeUnavailable { .. } => "container.runtime_unavailable",
            Self::CreateFailed { .. } => "container.create_failed",
            Self::ExecFailed { .. } => "container.exec_failed",
            Self::SnapshotFailed { .. } => "container.snapshot_failed",
            Self::NotARepository { .. } => "container.not_a_repository",
            Self::TransferFailed { .. } => "container.transfer_failed",
            Self::ProbeFailed { .. } => "container.probe_failed",
        };
        Some(code)
    }
}
