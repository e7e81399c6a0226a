//! Workflow run and step lifecycle events

use serde::{Deserialize, Serialize};
use std::time::Duration;
use stevedore_types::LogLevel;
use uuid::Uuid;

use super::FailureContext;

/// Events emitted by the workflow runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A run is about to execute its registered steps
    Started {
        run_id: Uuid,
        workflow: String,
        total_steps: usize,
    },

    /// An action step began executing
    StepStarted {
        index: usize,
        name: String,
        context: Option<String>,
    },

    /// A log-only step emitted its message
    StepLog {
        index: usize,
        level: LogLevel,
        message: String,
    },

    StepCompleted {
        index: usize,
        name: String,
        context: Option<String>,
        duration: Duration,
    },

    StepFailed {
        index: usize,
        name: String,
        context: Option<String>,
        duration: Duration,
        failure: FailureContext,
    },

    /// A step that will not run because an earlier step failed
    StepSkipped {
        index: usize,
        name: String,
        context: Option<String>,
    },

    /// The tool a failed step depends on is not installed
    ToolMissing {
        step: String,
        tool: String,
        install_instructions: String,
        documentation_url: Option<String>,
    },

    Completed {
        run_id: Uuid,
        workflow: String,
        duration: Duration,
        steps_run: usize,
        steps_failed: usize,
        success: bool,
    },
}
