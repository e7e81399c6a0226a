#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Container lifecycle management for stevedore
//!
//! A project gets one long-lived container per (directory, image, mount
//! root) identity. The manager reuses it while warm, otherwise recreates it,
//! and before every run copies in exactly the files git would consider part
//! of the project.

pub mod identity;
pub mod manager;
pub mod runtime;
pub mod snapshot;
pub mod transfer;

pub use identity::{ProjectIdentity, PROJECT_LABEL_KEY};
pub use manager::{ContainerHandle, ContainerLease, ContainerManager};
pub use runtime::{BindMount, ContainerRuntime, ContainerSpec, DockerCli, RunningContainer};
pub use snapshot::{compute_snapshot, enclosing_work_tree, snapshot, Snapshot};
pub use transfer::{ArchiveCapabilities, SyncReport, Transfer, SYNC_MANIFEST};
