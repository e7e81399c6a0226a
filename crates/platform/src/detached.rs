//! Executor bound to steps registered during a dry run

use async_trait::async_trait;
use stevedore_errors::{Error, ExecutionError};
use stevedore_types::{CommandOptions, CommandResult};

use crate::executor::CommandExecutor;

/// Refuses every command
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedExecutor;

#[async_trait]
impl CommandExecutor for DetachedExecutor {
    async fn execute(
        &self,
        _command: &str,
        _args: &[String],
        _options: &CommandOptions,
    ) -> Result<CommandResult, Error> {
        Err(ExecutionError::ExecutorDetached.into())
    }

    async fn is_available(&self, _command: &str) -> bool {
        false
    }

    fn describe(&self) -> String {
        "detached".to_string()
    }
}
