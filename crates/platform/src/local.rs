//! Executor running commands as child processes on the host

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stevedore_errors::Error;
use stevedore_events::EventSender;
use stevedore_types::{CommandOptions, CommandResult};

use crate::executor::CommandExecutor;
use crate::process::{PlatformCommand, ProcessRunner};

/// Runs commands on the local machine
///
/// Relative working directories resolve against `root`; absolute ones are
/// used as given.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    root: PathBuf,
    runner: ProcessRunner,
}

impl LocalExecutor {
    pub fn new(root: impl Into<PathBuf>, event_sender: Option<EventSender>) -> Self {
        let root = root.into();
        let runner = ProcessRunner::new(format!("local:{}", root.display()), event_sender);
        Self { root, runner }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a command with these options runs in
    #[must_use]
    pub fn resolve_working_dir(&self, working_dir: Option<&str>) -> PathBuf {
        match working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandResult, Error> {
        let mut cmd = PlatformCommand::new(command);
        cmd.args(args)
            .envs(&options.env)
            .current_dir(self.resolve_working_dir(options.working_dir.as_deref()));

        self.runner.run(&cmd, options.timeout, options.quiet).await
    }

    async fn is_available(&self, command: &str) -> bool {
        which::which_in(command, std::env::var_os("PATH"), &self.root).is_ok()
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_dir_resolves_against_root() {
        let executor = LocalExecutor::new("/src/app", None);
        assert_eq!(executor.resolve_working_dir(None), PathBuf::from("/src/app"));
        assert_eq!(
            executor.resolve_working_dir(Some("web")),
            PathBuf::from("/src/app/web")
        );
        assert_eq!(executor.resolve_working_dir(Some("/tmp")), PathBuf::from("/tmp"));
    }
}
