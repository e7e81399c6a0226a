//! Structured logging integration for events
//!
//! Library crates report progress as `AppEvent`s. This module turns each one
//! into a tracing record at the event's own level, with the event's data as
//! structured fields.

use stevedore_events::{
    AppEvent, ContainerEvent, GeneralEvent, OutputStream, ProcessEvent, WorkflowEvent,
};
use tracing::Level;

/// Dispatch to the tracing macro for a runtime level
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level: Level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+);
        } else if level == Level::WARN {
            tracing::warn!($($arg)+);
        } else if level == Level::INFO {
            tracing::info!($($arg)+);
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    }};
}

/// Log an `AppEvent` with structured fields
pub fn log_event(event: &AppEvent) {
    let level = event.log_level();
    let source = event.event_source().as_str();

    match event {
        AppEvent::General(general) => log_general(level, source, general),
        AppEvent::Workflow(workflow) => log_workflow(level, source, workflow),
        AppEvent::Process(process) => log_process(level, source, process),
        AppEvent::Container(container) => log_container(level, source, container),
    }
}

fn log_general(level: Level, source: &str, event: &GeneralEvent) {
    match event {
        GeneralEvent::Info { message } => {
            log_at!(level, target: "stevedore::events::general", source, "{message}");
        }
        GeneralEvent::Warning { message, context } => {
            log_at!(level, target: "stevedore::events::general", source, context = ?context, "{message}");
        }
        GeneralEvent::Error { message, details } => {
            log_at!(level, target: "stevedore::events::general", source, details = ?details, "{message}");
        }
        GeneralEvent::Debug { message } => {
            log_at!(level, target: "stevedore::events::general", source, "{message}");
        }
    }
}

fn log_workflow(level: Level, source: &str, event: &WorkflowEvent) {
    match event {
        WorkflowEvent::Started {
            run_id,
            workflow,
            total_steps,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                run_id = %run_id,
                workflow = %workflow,
                total_steps = total_steps,
                "Workflow started"
            );
        }
        WorkflowEvent::StepStarted {
            index,
            name,
            context,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                index = index,
                step = %name,
                context = ?context,
                "Step started"
            );
        }
        WorkflowEvent::StepLog {
            index,
            level: _,
            message,
        } => {
            log_at!(level, target: "stevedore::events::workflow", source, index = index, "{message}");
        }
        WorkflowEvent::StepCompleted {
            index,
            name,
            context,
            duration,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                index = index,
                step = %name,
                context = ?context,
                duration_ms = duration.as_millis(),
                "Step completed"
            );
        }
        WorkflowEvent::StepFailed {
            index,
            name,
            context,
            duration,
            failure,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                index = index,
                step = %name,
                context = ?context,
                duration_ms = duration.as_millis(),
                code = ?failure.code,
                hint = ?failure.hint,
                retryable = failure.retryable,
                "Step failed: {}",
                failure.message
            );
        }
        WorkflowEvent::StepSkipped {
            index,
            name,
            context,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                index = index,
                step = %name,
                context = ?context,
                "Step skipped"
            );
        }
        WorkflowEvent::ToolMissing {
            step,
            tool,
            install_instructions,
            documentation_url,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                step = %step,
                tool = %tool,
                documentation = ?documentation_url,
                "{tool} is not installed: {install_instructions}"
            );
        }
        WorkflowEvent::Completed {
            run_id,
            workflow,
            duration,
            steps_run,
            steps_failed,
            success,
        } => {
            log_at!(
                level,
                target: "stevedore::events::workflow",
                source,
                run_id = %run_id,
                workflow = %workflow,
                duration_ms = duration.as_millis(),
                steps_run = steps_run,
                steps_failed = steps_failed,
                success = success,
                "Workflow completed"
            );
        }
    }
}

fn log_process(level: Level, source: &str, event: &ProcessEvent) {
    match event {
        ProcessEvent::Started {
            command,
            executor,
            working_dir,
        } => {
            log_at!(
                level,
                target: "stevedore::events::process",
                source,
                executor = %executor,
                working_dir = ?working_dir,
                "$ {command}"
            );
        }
        ProcessEvent::Output {
            command,
            stream,
            line,
        } => {
            let stream = match stream {
                OutputStream::Stdout => "stdout",
                OutputStream::Stderr => "stderr",
            };
            log_at!(
                level,
                target: "stevedore::events::process",
                source,
                command = %command,
                stream,
                "{line}"
            );
        }
        ProcessEvent::Exited {
            command,
            exit_code,
            duration,
        } => {
            log_at!(
                level,
                target: "stevedore::events::process",
                source,
                command = %command,
                exit_code = exit_code,
                duration_ms = duration.as_millis(),
                "Process exited"
            );
        }
        ProcessEvent::TimedOut { command, timeout } => {
            log_at!(
                level,
                target: "stevedore::events::process",
                source,
                command = %command,
                timeout_ms = timeout.as_millis(),
                "Process timed out"
            );
        }
    }
}

fn log_container(level: Level, source: &str, event: &ContainerEvent) {
    match event {
        ContainerEvent::Reused { id, name } => {
            log_at!(level, target: "stevedore::events::container", source, id = %id, name = %name, "Reusing warm container");
        }
        ContainerEvent::Created { id, name, image } => {
            log_at!(
                level,
                target: "stevedore::events::container",
                source,
                id = %id,
                name = %name,
                image = %image,
                "Container created"
            );
        }
        ContainerEvent::Removed { id } => {
            log_at!(level, target: "stevedore::events::container", source, id = %id, "Container removed");
        }
        ContainerEvent::SnapshotComputed {
            root,
            files,
            git_aware,
        } => {
            log_at!(
                level,
                target: "stevedore::events::container",
                source,
                root = %root.display(),
                files = files,
                git_aware = git_aware,
                "Project snapshot computed"
            );
        }
        ContainerEvent::ArchiveProbed {
            container,
            supports_null,
        } => {
            log_at!(
                level,
                target: "stevedore::events::container",
                source,
                container = %container,
                supports_null = supports_null,
                "Probed container tar"
            );
        }
        ContainerEvent::Synced {
            container,
            mode,
            files,
            skipped,
            removed,
            duration,
        } => {
            log_at!(
                level,
                target: "stevedore::events::container",
                source,
                container = %container,
                mode = %mode,
                files = files,
                skipped = skipped,
                removed = removed,
                duration_ms = duration.as_millis(),
                "Project files synced"
            );
        }
    }
}
