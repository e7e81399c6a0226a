use serde::{Deserialize, Serialize};

use crate::EventSource;
use stevedore_errors::UserFacingError;
use stevedore_types::LogLevel;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the failure came from a typed error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Failure described only by a message
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None::<String>, message, None::<String>, false)
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod container;
pub mod general;
pub mod process;
pub mod workflow;

pub use container::*;
pub use general::*;
pub use process::*;
pub use workflow::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (info, warnings, errors)
    General(GeneralEvent),

    /// Workflow run and step lifecycle
    Workflow(WorkflowEvent),

    /// Child processes started by executors
    Process(ProcessEvent),

    /// Container lifecycle and file sync
    Container(ContainerEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Workflow(_) => EventSource::Workflow,
            Self::Process(_) => EventSource::Process,
            Self::Container(_) => EventSource::Container,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Workflow(
                WorkflowEvent::StepFailed { .. }
                | WorkflowEvent::ToolMissing { .. }
                | WorkflowEvent::Completed { success: false, .. },
            ) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Workflow(WorkflowEvent::StepSkipped { .. })
            | Self::Process(ProcessEvent::TimedOut { .. }) => Level::WARN,

            Self::Workflow(WorkflowEvent::StepLog { level, .. }) => match level {
                LogLevel::Debug => Level::DEBUG,
                LogLevel::Info => Level::INFO,
                LogLevel::Warning => Level::WARN,
                LogLevel::Error => Level::ERROR,
            },

            Self::General(GeneralEvent::Debug { .. })
            | Self::Process(ProcessEvent::Started { .. } | ProcessEvent::Exited { .. })
            | Self::Container(ContainerEvent::ArchiveProbed { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}
