//! Integration tests for events

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use stevedore_errors::WorkflowError;
    use stevedore_events::*;
    use stevedore_types::LogLevel;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_event_sender_helpers() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");
        tx.emit_step_skipped(3, "Npm.Test", None);

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, AppEvent::General(GeneralEvent::Error { .. })));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, AppEvent::General(GeneralEvent::Debug { .. })));

        let event3 = rx.recv().await.unwrap();
        assert!(matches!(
            event3,
            AppEvent::Workflow(WorkflowEvent::StepSkipped { index: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_absent_sender_is_a_no_op() {
        let sender: Option<EventSender> = None;
        sender.emit_info("nobody listening");
    }

    #[test]
    fn test_completed_event_level_follows_success() {
        let failed = AppEvent::Workflow(WorkflowEvent::Completed {
            run_id: Uuid::nil(),
            workflow: "app".into(),
            duration: Duration::from_secs(1),
            steps_run: 2,
            steps_failed: 1,
            success: false,
        });
        assert_eq!(failed.log_level(), tracing::Level::ERROR);

        let log = AppEvent::Workflow(WorkflowEvent::StepLog {
            index: 0,
            level: LogLevel::Warning,
            message: "heads up".into(),
        });
        assert_eq!(log.log_level(), tracing::Level::WARN);
        assert_eq!(log.event_source(), EventSource::Workflow);
    }

    #[test]
    fn test_failure_context_from_error() {
        let err = WorkflowError::StepFailed {
            name: "Cargo.Build".into(),
            context: None,
            message: "Step returned false".into(),
        };
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), Some("workflow.step_failed"));
        assert!(failure.hint.is_some());
        assert!(!failure.retryable);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Container(ContainerEvent::Removed { id: "abc".into() });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "container");
        assert_eq!(json["event"]["type"], "removed");
    }
}
