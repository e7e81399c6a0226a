//! Child process events shared by every executor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which pipe a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    Started {
        /// Program plus arguments, space separated
        command: String,
        executor: String,
        working_dir: Option<String>,
    },

    /// One line of live output
    Output {
        command: String,
        stream: OutputStream,
        line: String,
    },

    Exited {
        command: String,
        exit_code: i32,
        duration: Duration,
    },

    /// The command exceeded its timeout and was killed
    TimedOut { command: String, timeout: Duration },
}
