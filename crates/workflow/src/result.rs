//! Step and workflow results

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;
use stevedore_errors::Error;
use uuid::Uuid;

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub context: Option<String>,
    pub success: bool,
    #[serde(rename = "duration_ms", serialize_with = "duration_ms")]
    pub duration: Duration,
    pub error: Option<String>,
    /// Typed error when the step faulted
    #[serde(skip)]
    pub fault: Option<Error>,
}

impl StepResult {
    #[must_use]
    pub fn succeeded(name: impl Into<String>, context: Option<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            context,
            success: true,
            duration,
            error: None,
            fault: None,
        }
    }

    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        context: Option<String>,
        duration: Duration,
        error: impl Into<String>,
        fault: Option<Error>,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            success: false,
            duration,
            error: Some(error.into()),
            fault,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub duration: Duration,
    /// One entry per step that ran; skipped steps have none
    pub step_results: Vec<StepResult>,
}

impl WorkflowResult {
    #[must_use]
    pub fn steps_run(&self) -> usize {
        self.step_results.len()
    }

    #[must_use]
    pub fn steps_failed(&self) -> usize {
        self.step_results.iter().filter(|r| !r.success).count()
    }

    /// The failing step, if any
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results.iter().find(|r| !r.success)
    }
}

impl Serialize for WorkflowResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            run_id: &'a Uuid,
            workflow_name: &'a str,
            started_at: &'a DateTime<Utc>,
            success: bool,
            #[serde(serialize_with = "duration_ms")]
            duration_ms: &'a Duration,
            steps_run: usize,
            steps_failed: usize,
            step_results: &'a [StepResult],
        }

        Repr {
            run_id: &self.run_id,
            workflow_name: &self.workflow_name,
            started_at: &self.started_at,
            success: self.success,
            duration_ms: &self.duration,
            steps_run: self.steps_run(),
            steps_failed: self.steps_failed(),
            step_results: &self.step_results,
        }
        .serialize(serializer)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
