//! Command execution error types

use crate::UserFacingError;
use std::borrow::Cow;
use thiserror::Error;

/// Errors raised when an executor cannot run a command at all.
///
/// A command that runs and exits non-zero is not an error here; it is a
/// failed `CommandResult`.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    #[error("failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("deferred value '{name}' was read before the step producing it ran")]
    DeferredNotResolved { name: String },

    #[error("deferred value '{name}' was already resolved")]
    DeferredAlreadyResolved { name: String },

    #[error("executor is detached; steps registered during verification cannot run")]
    ExecutorDetached,

    #[error("I/O failure while running {command}: {message}")]
    Io { command: String, message: String },
}

impl UserFacingError for ExecutionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::SpawnFailed { .. } | Self::CommandNotFound { .. } => {
                Some("Install the command or run the build inside the container image that has it.")
            }
            Self::DeferredNotResolved { .. } => {
                Some("Register the step that produces the value before the steps that consume it.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::SpawnFailed { .. } => "execution.spawn_failed",
            Self::CommandNotFound { .. } => "execution.command_not_found",
            Self::DeferredNotResolved { .. } => "execution.deferred_not_resolved",
            Self::DeferredAlreadyResolved { .. } => "execution.deferred_already_resolved",
            Self::ExecutorDetached => "execution.executor_detached",
            Self::Io { .. } => "execution.io",
        };
        Some(code)
    }
}
