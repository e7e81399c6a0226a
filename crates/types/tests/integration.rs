//! Integration tests for types

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::time::Duration;
    use stevedore_types::*;

    #[test]
    fn test_command_result_serialization() {
        let result = CommandResult::from_exit(0, Some("hello\n".into()), None);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"exit_code":0,"success":true,"error":null,"output":"hello\n"}"#
        );
        assert_eq!(result.trimmed_output(), "hello");
    }

    #[test]
    fn test_timed_out_result() {
        let result = CommandResult::timed_out("sleep", Duration::from_millis(50), None);
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("50ms"));
    }

    #[test]
    fn test_log_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, r#""warning""#);
    }

    #[test]
    fn test_deferred_shared_across_threads() {
        let value = Deferred::new("Shell.Capture");
        let producer = value.clone();
        std::thread::spawn(move || producer.resolve("v1.2.3".into()).unwrap())
            .join()
            .unwrap();
        assert_eq!(value.get().unwrap(), "v1.2.3");
    }

    proptest! {
        #[test]
        fn env_keeps_last_value_for_each_key(pairs in proptest::collection::vec(("[A-D]", "[a-z]{0,4}"), 0..20)) {
            let opts = CommandOptions::new().with_envs(pairs.clone());
            for (key, value) in opts.env.iter() {
                let last = pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v);
                prop_assert_eq!(Some(value), last);
            }
            let mut distinct: Vec<&String> = pairs.iter().map(|(k, _)| k).collect();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(opts.env.len(), distinct.len());
        }
    }
}
