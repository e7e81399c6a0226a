//! Fail-fast sequential step runner

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use stevedore_errors::{Error, WorkflowError};
use stevedore_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, WorkflowEvent,
};
use uuid::Uuid;

use crate::outcome::StepOutcome;
use crate::registry::{BuildStep, StepAction, StepKind};
use crate::result::{StepResult, WorkflowResult};
use crate::tools::ToolCheckerRegistry;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Lifecycle of one step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Started,
    Completed,
    Failed,
    Skipped,
}

/// Runs registered steps in order and stops at the first failure
///
/// One runner drives one run. Steps are awaited one at a time; nothing is
/// retried and there is no way to continue past a failed step.
#[derive(Debug)]
pub struct WorkflowRunner {
    tools: ToolCheckerRegistry,
    state: RunState,
    step_states: Vec<StepState>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for WorkflowRunner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl WorkflowRunner {
    #[must_use]
    pub fn new(tools: ToolCheckerRegistry, event_sender: Option<EventSender>) -> Self {
        Self {
            tools,
            state: RunState::NotStarted,
            step_states: Vec::new(),
            event_sender,
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Per-step states of the last run, in step order
    #[must_use]
    pub fn step_states(&self) -> &[StepState] {
        &self.step_states
    }

    /// Execute `steps` in order
    ///
    /// Step failures never surface as `Err`; they are recorded in the
    /// returned result, whose `success` is false when any step failed.
    pub async fn run(&mut self, workflow_name: &str, steps: Vec<BuildStep>) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        self.state = RunState::Running;
        self.step_states = Vec::with_capacity(steps.len());
        self.emit_workflow_started(run_id, workflow_name, steps.len());
        tracing::debug!(%run_id, workflow = workflow_name, steps = steps.len(), "workflow started");

        let mut step_results = Vec::with_capacity(steps.len());
        let mut failed = false;

        for (index, step) in steps.iter().enumerate() {
            if failed {
                self.step_states.push(StepState::Skipped);
                self.emit_step_skipped(index, step.name(), step.context().map(str::to_string));
                continue;
            }

            let result = match step.kind() {
                StepKind::Log { level, message } => {
                    self.emit(AppEvent::Workflow(WorkflowEvent::StepLog {
                        index,
                        level: *level,
                        message: message.clone(),
                    }));
                    self.step_states.push(StepState::Completed);
                    StepResult::succeeded(step.name(), None, Duration::ZERO)
                }
                StepKind::Action(action) => self.run_action(index, step, action).await,
            };

            failed = !result.success;
            step_results.push(result);
        }

        let result = WorkflowResult {
            run_id,
            workflow_name: workflow_name.to_string(),
            started_at,
            success: !failed,
            duration: start.elapsed(),
            step_results,
        };

        self.state = if result.success {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.emit_workflow_completed(
            run_id,
            workflow_name,
            result.duration,
            result.steps_run(),
            result.steps_failed(),
        );
        result
    }

    async fn run_action(&mut self, index: usize, step: &BuildStep, action: &StepAction) -> StepResult {
        let name = step.name();
        let context = step.context().map(str::to_string);

        self.step_states.push(StepState::Started);
        self.emit_step_started(index, name, context.clone());

        let start = Instant::now();
        let outcome = invoke(name, action).await;
        let duration = start.elapsed();

        let (message, fault) = match outcome {
            StepOutcome::Succeeded => {
                self.set_last_state(StepState::Completed);
                self.emit_step_completed(index, name, context.clone(), duration);
                return StepResult::succeeded(name, context, duration);
            }
            StepOutcome::Failed(message) => (message, None),
            StepOutcome::Faulted(err) => (err.to_string(), Some(err)),
        };

        self.set_last_state(StepState::Failed);
        let failure = fault
            .as_ref()
            .map_or_else(|| FailureContext::message(message.clone()), FailureContext::from_error);
        tracing::debug!(step = name, error = %message, "step failed");
        self.emit_step_failed(index, name, context.clone(), duration, failure);
        self.report_missing_tool(name).await;

        StepResult::failed(name, context, duration, message, fault)
    }

    async fn report_missing_tool(&self, step_name: &str) {
        let Some(missing) = self.tools.check(step_name).await else {
            return;
        };
        self.emit(AppEvent::Workflow(WorkflowEvent::ToolMissing {
            step: step_name.to_string(),
            tool: missing.tool,
            install_instructions: missing.install_instructions,
            documentation_url: missing.documentation_url,
        }));
    }

    fn set_last_state(&mut self, state: StepState) {
        if let Some(last) = self.step_states.last_mut() {
            *last = state;
        }
    }
}

/// Await one action, turning a panic into a fault
async fn invoke(name: &str, action: &StepAction) -> StepOutcome {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| action())) {
        Ok(future) => future,
        Err(payload) => return panicked(name, payload.as_ref()),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => panicked(name, payload.as_ref()),
    }
}

fn panicked(name: &str, payload: &(dyn Any + Send)) -> StepOutcome {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    StepOutcome::Faulted(Error::from(WorkflowError::StepPanicked {
        name: name.to_string(),
        message,
    }))
}
