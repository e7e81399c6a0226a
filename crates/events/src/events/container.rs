//! Container lifecycle and file sync events

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerEvent {
    /// A warm container for the project was found and will be reused
    Reused { id: String, name: String },

    Created {
        id: String,
        name: String,
        image: String,
    },

    Removed { id: String },

    /// The set of project files to transfer was computed
    SnapshotComputed {
        root: PathBuf,
        files: usize,
        /// Whether git ignore rules were applied
        git_aware: bool,
    },

    /// The container's archive tool was probed for NUL-delimited list support
    ArchiveProbed { container: String, supports_null: bool },

    /// Project files were copied into the container
    Synced {
        container: String,
        mode: String,
        files: usize,
        skipped: usize,
        /// Stale files deleted from an earlier sync
        removed: usize,
        duration: Duration,
    },
}
