#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Command execution for stevedore
//!
//! This crate provides the [`CommandExecutor`] abstraction every build step
//! runs through, with three implementations:
//! - [`LocalExecutor`]: child processes on the host
//! - [`ContainerExecutor`]: `<runtime> exec` into a running container
//! - [`DetachedExecutor`]: a placeholder bound during dry runs
//!
//! Both real executors share one [`process::ProcessRunner`] so timeouts,
//! output capture and process events behave identically.

pub mod container;
pub mod detached;
pub mod executor;
pub mod local;
pub mod process;

pub use container::{resolve_container_path, ContainerExecutor, HostMapping, ResolvedPath, EXEC_MARKER_VAR};
pub use detached::DetachedExecutor;
pub use executor::{CommandExecutor, SharedExecutor};
pub use local::LocalExecutor;
pub use process::{shell_quote, PlatformCommand, ProcessRunner};
