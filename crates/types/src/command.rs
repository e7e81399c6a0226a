//! Command invocation options and results shared by every executor

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit code reported for a command killed because its timeout expired
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Per-invocation options for a command
///
/// `working_dir` is interpreted relative to an executor-specific root.
/// Environment keys are unique; inserting an existing key replaces its
/// value but keeps its original position, so flag order stays stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// `None` means no timeout
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Suppress live output; the output is still captured in the result
    #[serde(default)]
    pub quiet: bool,
}

impl CommandOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge an overlay; later values win
    #[must_use]
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Millisecond timeout; zero or negative means no timeout
    #[must_use]
    pub fn with_timeout_ms(self, millis: i64) -> Self {
        let timeout = u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        self.with_timeout(timeout)
    }

    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Outcome of a single command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub success: bool,
    pub error: Option<String>,
    pub output: Option<String>,
}

impl CommandResult {
    /// Result of a process that ran to completion
    #[must_use]
    pub fn from_exit(exit_code: i32, output: Option<String>, stderr: Option<String>) -> Self {
        let success = exit_code == 0;
        let error = if success {
            None
        } else {
            Some(
                stderr
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| format!("exited with code {exit_code}")),
            )
        };
        Self {
            exit_code,
            success,
            error,
            output,
        }
    }

    /// A failure that did not come from a process exit status
    #[must_use]
    pub fn synthetic_failure(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            success: false,
            error: Some(error.into()),
            output: None,
        }
    }

    #[must_use]
    pub fn timed_out(command: &str, timeout: Duration, output: Option<String>) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            success: false,
            error: Some(format!(
                "{command} timed out after {}ms and was terminated",
                timeout.as_millis()
            )),
            output,
        }
    }

    /// Captured stdout with surrounding whitespace removed
    #[must_use]
    pub fn trimmed_output(&self) -> &str {
        self.output.as_deref().map_or("", str::trim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overlay_is_last_write_wins_in_insertion_order() {
        let opts = CommandOptions::new()
            .with_env("A", "1")
            .with_env("B", "2")
            .with_env("A", "3");

        let pairs: Vec<_> = opts.env.iter().collect();
        assert_eq!(
            pairs,
            vec![(&"A".to_string(), &"3".to_string()), (&"B".to_string(), &"2".to_string())]
        );
    }

    #[test]
    fn non_positive_timeout_means_none() {
        assert_eq!(CommandOptions::new().with_timeout_ms(0).timeout, None);
        assert_eq!(CommandOptions::new().with_timeout_ms(-1).timeout, None);
        assert_eq!(
            CommandOptions::new().with_timeout_ms(250).timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn failed_exit_prefers_stderr_text() {
        let result = CommandResult::from_exit(2, None, Some("boom\n".into()));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom\n"));

        let result = CommandResult::from_exit(3, None, Some("  ".into()));
        assert_eq!(result.error.as_deref(), Some("exited with code 3"));
    }

    #[test]
    fn synthetic_failure_can_carry_zero_exit_code() {
        let result = CommandResult::synthetic_failure(0, "runtime unreachable");
        assert_eq!(result.exit_code, 0);
        assert!(!result.success);
    }
}
