//! Child process execution with timeouts, output capture and events

use indexmap::IndexMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use stevedore_errors::{Error, ExecutionError};
use stevedore_events::{AppEvent, EventEmitter, EventSender, OutputStream, ProcessEvent};
use stevedore_types::CommandResult;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long output readers may keep draining after a timed-out child is killed
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Command builder shared by every executor
#[derive(Debug, Clone, Default)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: IndexMap<String, String>,
    stdin: Option<Vec<u8>>,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn envs<'a, I>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Bytes written to the child's stdin, which is then closed
    pub fn stdin(&mut self, input: Vec<u8>) -> &mut Self {
        self.stdin = Some(input);
        self
    }

    /// Get the program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// Program and arguments joined for display
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs [`PlatformCommand`]s and reports them as [`ProcessEvent`]s
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    label: String,
    event_sender: Option<EventSender>,
}

impl EventEmitter for ProcessRunner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ProcessRunner {
    /// `label` names the executor in process events
    pub fn new(label: impl Into<String>, event_sender: Option<EventSender>) -> Self {
        Self {
            label: label.into(),
            event_sender,
        }
    }

    /// Run a command to completion
    ///
    /// Stdout and stderr are captured in full. Unless `quiet`, every line is
    /// also emitted as a `ProcessEvent::Output` while the command runs. An
    /// expired `timeout` kills the child and yields a timed-out result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or waited on.
    pub async fn run(
        &self,
        cmd: &PlatformCommand,
        timeout: Option<Duration>,
        quiet: bool,
    ) -> Result<CommandResult, Error> {
        let cmdline = cmd.display();
        self.emit(AppEvent::Process(ProcessEvent::Started {
            command: cmdline.clone(),
            executor: self.label.clone(),
            working_dir: cmd
                .get_current_dir()
                .map(|dir| dir.display().to_string()),
        }));

        let start = Instant::now();
        let mut command = Command::new(cmd.program());
        command
            .args(cmd.get_args())
            .envs(&cmd.env)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cmd.get_current_dir() {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| spawn_error(cmd.program(), &e))?;

        let stdin_task = match (child.stdin.take(), cmd.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
                pipe.write_all(&input).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let live = if quiet { None } else { self.event_sender.clone() };
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| spawn_reader(pipe, OutputStream::Stdout, live.clone(), cmdline.clone()));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| spawn_reader(pipe, OutputStream::Stderr, live, cmdline.clone()));

        let waited = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
            None => Some(child.wait().await),
        };

        let Some(status) = waited else {
            // timeout expired
            let limit = timeout.unwrap_or_default();
            if let Err(e) = child.kill().await {
                tracing::debug!(command = %cmdline, error = %e, "failed to kill timed-out child");
            }
            let stdout = drain(stdout_task, Some(KILL_DRAIN_GRACE)).await;
            drain(stderr_task, Some(KILL_DRAIN_GRACE)).await;
            self.emit(AppEvent::Process(ProcessEvent::TimedOut {
                command: cmdline.clone(),
                timeout: limit,
            }));
            return Ok(CommandResult::timed_out(&cmdline, limit, stdout));
        };

        let status = status.map_err(|e| ExecutionError::Io {
            command: cmdline.clone(),
            message: e.to_string(),
        })?;

        if let Some(task) = stdin_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(command = %cmdline, error = %e, "child closed stdin early");
                }
                Err(e) => {
                    tracing::debug!(command = %cmdline, error = %e, "stdin writer aborted");
                }
            }
        }

        let stdout = drain(stdout_task, None).await;
        let stderr = drain(stderr_task, None).await;
        let exit_code = status.code().unwrap_or(-1);

        self.emit(AppEvent::Process(ProcessEvent::Exited {
            command: cmdline,
            exit_code,
            duration: start.elapsed(),
        }));

        Ok(CommandResult::from_exit(exit_code, stdout, stderr))
    }
}

fn spawn_error(program: &str, err: &std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExecutionError::CommandNotFound {
            command: program.to_string(),
        }
        .into()
    } else {
        ExecutionError::SpawnFailed {
            command: program.to_string(),
            message: err.to_string(),
        }
        .into()
    }
}

fn spawn_reader<R>(
    pipe: R,
    stream: OutputStream,
    live: Option<EventSender>,
    command: String,
) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut captured = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    captured.push_str(&text);
                    if let Some(sender) = &live {
                        sender.emit(AppEvent::Process(ProcessEvent::Output {
                            command: command.clone(),
                            stream,
                            line: text.trim_end_matches(['\r', '\n']).to_string(),
                        }));
                    }
                }
                Err(e) => {
                    tracing::debug!(command = %command, error = %e, "output stream read failed");
                    break;
                }
            }
        }
        captured
    })
}

/// Collect a reader's output; with a grace period, give up after it
async fn drain(task: Option<JoinHandle<String>>, grace: Option<Duration>) -> Option<String> {
    let mut task = task?;
    let joined = match grace {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return None;
            }
        },
        None => task.await,
    };
    joined.ok().filter(|text| !text.is_empty())
}

/// Quote a string for a POSIX shell command line
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ','))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let mut cmd = PlatformCommand::new("dotnet");
        cmd.args(["build", "-c", "Release"]);
        assert_eq!(cmd.display(), "dotnet build -c Release");
    }

    #[test]
    fn shell_quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("/workspace/src"), "/workspace/src");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[tokio::test]
    async fn captures_stdout_and_streams_lines() {
        let (tx, mut rx) = stevedore_events::channel();
        let runner = ProcessRunner::new("test", Some(tx));
        let mut cmd = PlatformCommand::new("sh");
        cmd.args(["-c", "echo one; echo two"]);

        let result = runner.run(&cmd, None, false).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("one\ntwo\n"));

        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Process(ProcessEvent::Output { line, .. }) = event {
                lines.push(line);
            }
        }
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn quiet_suppresses_output_events_but_keeps_capture() {
        let (tx, mut rx) = stevedore_events::channel();
        let runner = ProcessRunner::new("test", Some(tx));
        let mut cmd = PlatformCommand::new("sh");
        cmd.args(["-c", "echo hidden"]);

        let result = runner.run(&cmd, None, true).await.unwrap();
        assert_eq!(result.trimmed_output(), "hidden");
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, AppEvent::Process(ProcessEvent::Output { .. })));
        }
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let runner = ProcessRunner::new("test", None);
        let mut cmd = PlatformCommand::new("cat");
        cmd.stdin(b"piped input".to_vec());

        let result = runner.run(&cmd, None, true).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("piped input"));
    }

    #[tokio::test]
    async fn timed_out_result_names_the_command_line() {
        let (tx, mut rx) = stevedore_events::channel();
        let runner = ProcessRunner::new("test", Some(tx));
        let mut cmd = PlatformCommand::new("sh");
        cmd.args(["-c", "exec sleep 5"]);

        let result = runner
            .run(&cmd, Some(Duration::from_millis(50)), true)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("sh -c exec sleep 5 timed out")));

        let mut timed_out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Process(ProcessEvent::TimedOut { command, .. }) = event {
                timed_out.push(command);
            }
        }
        assert_eq!(timed_out, vec!["sh -c exec sleep 5"]);
    }
}
