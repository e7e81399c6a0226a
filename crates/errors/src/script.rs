//! Build script error types

use std::borrow::Cow;
use std::fmt;

use crate::UserFacingError;
use thiserror::Error;

/// A single compiler diagnostic with an optional source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    #[must_use]
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{line}:{column}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ScriptError {
    #[error("failed to read build script {path}: {message}")]
    Read { path: String, message: String },

    #[error("build script {path} failed to compile: {}", join_diagnostics(.diagnostics))]
    Compile {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("build script {path} failed while registering steps: {message}")]
    Registration { path: String, message: String },

    #[error("invalid metadata in {path}: {message}")]
    Metadata { path: String, message: String },

    #[error("unknown executor '{name}' (expected \"local\" or \"container\")")]
    UnknownExecutor { name: String },

    #[error("container executor requested but no container is attached to this run")]
    ContainerUnavailable,
}

impl UserFacingError for ScriptError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Read { .. } => Some("Check the script path or pass one explicitly."),
            Self::Compile { .. } => {
                Some("Fix the reported syntax errors; no step has been executed.")
            }
            Self::Registration { .. } | Self::Metadata { .. } => {
                Some("The script compiled but build(ctx) raised an error before any step ran.")
            }
            Self::UnknownExecutor { .. } => Some("Use use_executor(ctx, \"local\") or \"container\"."),
            Self::ContainerUnavailable => {
                Some("Enable [container] in the configuration or drop --local.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Read { .. } => "script.read",
            Self::Compile { .. } => "script.compile",
            Self::Registration { .. } => "script.registration",
            Self::Metadata { .. } => "script.metadata",
            Self::UnknownExecutor { .. } => "script.unknown_executor",
            Self::ContainerUnavailable => "script.container_unavailable",
        };
        Some(code)
    }
}
