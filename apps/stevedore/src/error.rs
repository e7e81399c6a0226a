//! CLI error handling

use std::fmt;

use stevedore_errors::{Error, ScriptError, UserFacingError};

/// Why a command did not complete
#[derive(Debug)]
pub enum CliError {
    /// A library operation failed, including a failed workflow run
    Run(Error),
    /// Bad command line input
    InvalidArguments(String),
    /// Writing results to the terminal failed
    Output(std::io::Error),
}

impl CliError {
    /// Process exit status for this failure
    ///
    /// A script that never ran exits with 2, an interrupted run with 130 and
    /// everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Run(Error::Script(
                ScriptError::Read { .. } | ScriptError::Compile { .. },
            ))
            | CliError::InvalidArguments(_) => 2,
            CliError::Run(Error::Cancelled) => 130,
            CliError::Run(_) | CliError::Output(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Run(e) => {
                if let Error::Script(ScriptError::Compile { path, diagnostics }) = e {
                    write!(f, "build script {path} failed to compile:")?;
                    for diagnostic in diagnostics {
                        write!(f, "\n  {path}:{diagnostic}")?;
                    }
                } else {
                    write!(f, "{}", e.user_message())?;
                }
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retrying may succeed.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Output(e) => write!(f, "Failed to write output: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Run(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Run(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_errors::{Diagnostic, WorkflowError};

    #[test]
    fn compile_errors_list_diagnostics() {
        let err = CliError::from(Error::from(ScriptError::Compile {
            path: "build.star".into(),
            diagnostics: vec![Diagnostic::new("expected ':'").at(1, 14)],
        }));

        let text = err.to_string();
        assert!(text.contains("expected ':'"));
        assert!(text.contains("Code: script.compile"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn failed_steps_and_cancellation_have_distinct_codes() {
        let failed = CliError::from(Error::from(WorkflowError::StepFailed {
            name: "Dotnet.Build".into(),
            context: None,
            message: "exited with code 1".into(),
        }));
        assert_eq!(failed.exit_code(), 1);
        assert_eq!(CliError::from(Error::Cancelled).exit_code(), 130);
    }
}
