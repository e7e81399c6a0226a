//! The executor trait build steps are bound to

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use stevedore_errors::Error;
use stevedore_types::{CommandOptions, CommandResult};

/// Runs a single command somewhere
///
/// `execute` returns `Err` only when the command could not be started at
/// all (missing binary, unreachable runtime). A non-zero exit or an expired
/// timeout is an `Ok` result with `success == false`.
#[async_trait]
pub trait CommandExecutor: Send + Sync + fmt::Debug {
    /// Run `command` with `args` and wait for it to finish
    async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandResult, Error>;

    /// Whether `command` can be found where this executor runs
    async fn is_available(&self, command: &str) -> bool;

    /// Short human-readable description, e.g. `local:/src/app`
    fn describe(&self) -> String;
}

/// Executors are shared between the steps that captured them
pub type SharedExecutor = Arc<dyn CommandExecutor>;
