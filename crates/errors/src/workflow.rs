//! Workflow run error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    #[error("step {name}{} failed: {message}", context_suffix(.context.as_deref()))]
    StepFailed {
        name: String,
        context: Option<String>,
        message: String,
    },

    #[error("step {name} panicked: {message}")]
    StepPanicked { name: String, message: String },
}

fn context_suffix(context: Option<&str>) -> String {
    context.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl UserFacingError for WorkflowError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::StepFailed { .. } => Some("Later steps were not run. Fix the failing step and rerun."),
            Self::StepPanicked { .. } => Some("This is a bug in a step implementation; please report it."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::StepFailed { .. } => "workflow.step_failed",
            Self::StepPanicked { .. } => "workflow.step_panicked",
        })
    }
}
