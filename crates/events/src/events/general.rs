use serde::{Deserialize, Serialize};

/// Free-form messages not tied to a workflow step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneralEvent {
    Info {
        message: String,
    },
    Warning {
        message: String,
        context: Option<String>,
    },
    Error {
        message: String,
        details: Option<String>,
    },
    Debug {
        message: String,
    },
}

impl GeneralEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    /// Warning, optionally naming what it concerns (a path, a container)
    pub fn warning(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context,
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::Debug {
            message: message.into(),
        }
    }

    /// The human-readable message
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info { message }
            | Self::Warning { message, .. }
            | Self::Error { message, .. }
            | Self::Debug { message } => message,
        }
    }
}
