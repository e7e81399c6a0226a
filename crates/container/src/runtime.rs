//! Container runtime abstraction and its docker-compatible CLI implementation

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use stevedore_errors::{ContainerError, Error};
use stevedore_events::EventSender;
use stevedore_platform::{PlatformCommand, ProcessRunner};
use stevedore_types::CommandResult;

/// A container found by label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    pub id: String,
    pub name: String,
}

/// Bind mount from the host into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// Everything needed to start a long-lived build container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `key=value` labels
    pub labels: Vec<String>,
    pub mounts: Vec<BindMount>,
    pub workdir: String,
}

/// Operations the lifecycle manager needs from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync + fmt::Debug {
    /// Binary used for `exec`; handed to the container executor
    fn binary(&self) -> &str;

    /// First running container carrying `label` (`key=value`)
    async fn find_running(&self, label: &str) -> Result<Option<RunningContainer>, Error>;

    /// Force-remove a container by id or name; a missing container is not an error
    async fn remove(&self, id: &str) -> Result<(), Error>;

    /// Start a container and return its id
    async fn create(&self, spec: &ContainerSpec) -> Result<String, Error>;

    /// `exec` a command, optionally feeding bytes on stdin
    async fn exec_with_input(
        &self,
        id: &str,
        argv: &[String],
        stdin: Option<Vec<u8>>,
    ) -> Result<CommandResult, Error>;
}

/// Docker-compatible command line runtime (docker, podman)
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    runner: ProcessRunner,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, event_sender: Option<EventSender>) -> Self {
        let binary = binary.into();
        let runner = ProcessRunner::new(format!("runtime:{binary}"), event_sender);
        Self { binary, runner }
    }

    async fn invoke<I, S>(&self, args: I, stdin: Option<Vec<u8>>) -> Result<CommandResult, Error>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<str>,
    {
        let mut cmd = PlatformCommand::new(&self.binary);
        cmd.args(args);
        if let Some(input) = stdin {
            cmd.stdin(input);
        }
        self.runner
            .run(&cmd, None, true)
            .await
            .map_err(|e| unreachable_runtime(&self.binary, e))
    }
}

/// Arguments for `run` that start a container which idles until removed
#[must_use]
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-d".to_string()];
    for label in &spec.labels {
        args.push("--label".to_string());
        args.push(label.clone());
    }
    args.push("--name".to_string());
    args.push(spec.name.clone());
    for mount in &spec.mounts {
        args.push("-v".to_string());
        let mut volume = format!("{}:{}", mount.host.display(), mount.container);
        if mount.read_only {
            volume.push_str(":ro");
        }
        args.push(volume);
    }
    args.push("-w".to_string());
    args.push(spec.workdir.clone());
    args.push(spec.image.clone());
    args.push("sleep".to_string());
    args.push("infinity".to_string());
    args
}

fn unreachable_runtime(binary: &str, err: Error) -> Error {
    match err {
        Error::Execution(exec) => {
            let container: ContainerError = exec.into();
            match container {
                ContainerError::ExecFailed { message, .. } => ContainerError::RuntimeUnavailable {
                    runtime: binary.to_string(),
                    message,
                }
                .into(),
                other => other.into(),
            }
        }
        other => other,
    }
}

fn failure_text(result: &CommandResult) -> String {
    result
        .error
        .as_deref()
        .map_or_else(|| format!("exit code {}", result.exit_code), |e| e.trim().to_string())
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    fn binary(&self) -> &str {
        &self.binary
    }

    async fn find_running(&self, label: &str) -> Result<Option<RunningContainer>, Error> {
        let filter = format!("label={label}");
        let result = self
            .invoke(
                [
                    "ps",
                    "--filter",
                    filter.as_str(),
                    "--filter",
                    "status=running",
                    "--format",
                    "{{.ID}}\t{{.Names}}",
                ],
                None,
            )
            .await?;

        if !result.success {
            return Err(ContainerError::RuntimeUnavailable {
                runtime: self.binary.clone(),
                message: failure_text(&result),
            }
            .into());
        }

        Ok(result.trimmed_output().lines().find_map(|line| {
            let mut parts = line.split('\t');
            let id = parts.next()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(RunningContainer {
                id: id.to_string(),
                name: parts.next().unwrap_or_default().trim().to_string(),
            })
        }))
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        let result = self.invoke(["rm", "-f", id], None).await?;
        if result.success {
            return Ok(());
        }
        let message = failure_text(&result);
        if message.contains("No such container") || message.contains("no such container") {
            return Ok(());
        }
        Err(ContainerError::ExecFailed {
            command: format!("{} rm -f {id}", self.binary),
            message,
        }
        .into())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, Error> {
        let result = self.invoke(run_args(spec), None).await?;
        let id = result.trimmed_output().lines().last().unwrap_or_default().trim();
        if !result.success || id.is_empty() {
            return Err(ContainerError::CreateFailed {
                image: spec.image.clone(),
                message: failure_text(&result),
            }
            .into());
        }
        Ok(id.to_string())
    }

    async fn exec_with_input(
        &self,
        id: &str,
        argv: &[String],
        stdin: Option<Vec<u8>>,
    ) -> Result<CommandResult, Error> {
        let mut args = vec!["exec".to_string()];
        if stdin.is_some() {
            args.push("-i".to_string());
        }
        args.push(id.to_string());
        args.extend(argv.iter().cloned());
        self.invoke(args, stdin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_start_an_idle_labelled_container() {
        let spec = ContainerSpec {
            name: "stevedore-0123456789ab".into(),
            image: "debian:bookworm-slim".into(),
            labels: vec!["stevedore.project=0123456789abcdef".into()],
            mounts: vec![BindMount {
                host: PathBuf::from("/home/dev/app"),
                container: "/mnt/stevedore-src".into(),
                read_only: true,
            }],
            workdir: "/workspace".into(),
        };

        assert_eq!(
            run_args(&spec),
            vec![
                "run",
                "-d",
                "--label",
                "stevedore.project=0123456789abcdef",
                "--name",
                "stevedore-0123456789ab",
                "-v",
                "/home/dev/app:/mnt/stevedore-src:ro",
                "-w",
                "/workspace",
                "debian:bookworm-slim",
                "sleep",
                "infinity",
            ]
        );
    }

    #[tokio::test]
    async fn missing_runtime_binary_is_runtime_unavailable() {
        let runtime = DockerCli::new("stevedore-no-such-runtime", None);
        let err = runtime.find_running("stevedore.project=x").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Container(ContainerError::RuntimeUnavailable { .. })
        ));
    }
}
