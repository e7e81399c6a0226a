#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in stevedore
//!
//! Library crates never print. Everything a user might want to see (step
//! progress, process output, container decisions, warnings) travels as an
//! [`AppEvent`] over an unbounded channel; the CLI turns events into
//! structured `tracing` records.

pub mod meta;
pub use meta::EventSource;

pub mod events;
pub use events::{
    AppEvent, ContainerEvent, FailureContext, GeneralEvent, OutputStream, ProcessEvent,
    WorkflowEvent,
};

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Type alias for event sender using the `AppEvent` system
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver using the `AppEvent` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel with the `AppEvent` system
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout stevedore
///
/// Works the same whether you hold a raw `EventSender` or a struct that
/// optionally carries one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // A closed receiver means nobody is listening
            let _ = sender.send(event);
        }
    }

    fn emit_info(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::info(message)));
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message, None)));
    }

    /// Warning about a specific path, container or step
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(
            message,
            Some(context.into()),
        )));
    }

    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message, None)));
    }

    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(
            message,
            Some(details.into()),
        )));
    }

    fn emit_workflow_started(&self, run_id: Uuid, workflow: impl Into<String>, total_steps: usize) {
        self.emit(AppEvent::Workflow(WorkflowEvent::Started {
            run_id,
            workflow: workflow.into(),
            total_steps,
        }));
    }

    fn emit_workflow_completed(
        &self,
        run_id: Uuid,
        workflow: impl Into<String>,
        duration: Duration,
        steps_run: usize,
        steps_failed: usize,
    ) {
        self.emit(AppEvent::Workflow(WorkflowEvent::Completed {
            run_id,
            workflow: workflow.into(),
            duration,
            steps_run,
            steps_failed,
            success: steps_failed == 0,
        }));
    }

    fn emit_step_started(&self, index: usize, name: impl Into<String>, context: Option<String>) {
        self.emit(AppEvent::Workflow(WorkflowEvent::StepStarted {
            index,
            name: name.into(),
            context,
        }));
    }

    fn emit_step_completed(
        &self,
        index: usize,
        name: impl Into<String>,
        context: Option<String>,
        duration: Duration,
    ) {
        self.emit(AppEvent::Workflow(WorkflowEvent::StepCompleted {
            index,
            name: name.into(),
            context,
            duration,
        }));
    }

    fn emit_step_failed(
        &self,
        index: usize,
        name: impl Into<String>,
        context: Option<String>,
        duration: Duration,
        failure: FailureContext,
    ) {
        self.emit(AppEvent::Workflow(WorkflowEvent::StepFailed {
            index,
            name: name.into(),
            context,
            duration,
            failure,
        }));
    }

    fn emit_step_skipped(&self, index: usize, name: impl Into<String>, context: Option<String>) {
        self.emit(AppEvent::Workflow(WorkflowEvent::StepSkipped {
            index,
            name: name.into(),
            context,
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

/// Optional sender, for components that may run without a listener
impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
