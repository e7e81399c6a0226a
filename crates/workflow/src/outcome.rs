//! What a step's executable unit reports back

use stevedore_errors::Error;
use stevedore_types::CommandResult;

/// Message recorded when a step signals failure without saying why
pub const STEP_RETURNED_FALSE: &str = "Step returned false";

/// Result of awaiting one action step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Succeeded,
    /// The step ran and reported failure
    Failed(String),
    /// The step could not do its work; the error is kept for the caller
    Faulted(Error),
}

impl StepOutcome {
    /// Map a command invocation onto a step outcome
    ///
    /// A non-zero exit or timeout fails the step with the command's error
    /// text; an executor error faults it.
    #[must_use]
    pub fn from_command(result: Result<CommandResult, Error>) -> Self {
        match result {
            Ok(result) if result.success => Self::Succeeded,
            Ok(result) => Self::Failed(
                result
                    .error
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("exited with code {}", result.exit_code)),
            ),
            Err(err) => Self::Faulted(err),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl From<bool> for StepOutcome {
    fn from(success: bool) -> Self {
        if success {
            Self::Succeeded
        } else {
            Self::Failed(STEP_RETURNED_FALSE.to_string())
        }
    }
}

impl From<Result<bool, Error>> for StepOutcome {
    fn from(result: Result<bool, Error>) -> Self {
        match result {
            Ok(success) => success.into(),
            Err(err) => Self::Faulted(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_false_uses_fixed_message() {
        assert!(matches!(
            StepOutcome::from(false),
            StepOutcome::Failed(message) if message == STEP_RETURNED_FALSE
        ));
        assert!(StepOutcome::from(true).is_success());
    }

    #[test]
    fn command_failure_carries_error_text() {
        let outcome = StepOutcome::from_command(Ok(CommandResult::from_exit(
            1,
            None,
            Some("error CS1002: ; expected\n".into()),
        )));
        assert!(matches!(outcome, StepOutcome::Failed(m) if m == "error CS1002: ; expected"));
    }

    #[test]
    fn executor_error_faults() {
        let outcome = StepOutcome::from_command(Err(Error::internal("runtime gone")));
        assert!(matches!(outcome, StepOutcome::Faulted(_)));
    }
}
