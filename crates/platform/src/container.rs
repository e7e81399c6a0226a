//! Executor running commands inside a container via `<runtime> exec`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use stevedore_errors::Error;
use stevedore_events::{EventEmitter, EventSender};
use stevedore_types::{CommandOptions, CommandResult, TIMEOUT_EXIT_CODE};

use crate::executor::CommandExecutor;
use crate::process::{shell_quote, PlatformCommand, ProcessRunner};

/// Environment variable tagging every process started for one timed command
pub const EXEC_MARKER_VAR: &str = "STEVEDORE_EXEC_ID";

static EXEC_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_exec_marker() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        EXEC_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

/// Relationship between the host project directory and the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMapping {
    /// Host paths under this directory appear under the mount root
    Mapped(PathBuf),
    /// No host directory is known; host paths cannot be translated
    Unmapped,
}

/// A working directory translated into container terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    /// An absolute path outside the mount root was passed through while no
    /// host mapping was configured
    pub unmapped_host_path: bool,
}

/// Translate a working directory into a path inside the container
///
/// In order: a path under the mapped host root is rebased onto
/// `mount_root`; an absolute path already under `mount_root` is kept; a
/// relative path (or none) is joined onto `mount_root`; any other absolute
/// path is kept as is.
#[must_use]
pub fn resolve_container_path(
    mount_root: &str,
    mapping: &HostMapping,
    path: Option<&str>,
) -> ResolvedPath {
    let keep = |path: &str, unmapped_host_path: bool| ResolvedPath {
        path: path.to_string(),
        unmapped_host_path,
    };

    let Some(raw) = path else {
        return keep(mount_root, false);
    };
    let candidate = Path::new(raw);

    if let HostMapping::Mapped(host_root) = mapping {
        if let Ok(relative) = candidate.strip_prefix(host_root) {
            return keep(&join_under(mount_root, relative), false);
        }
    }

    if candidate.is_absolute() {
        let under_mount = candidate.strip_prefix(mount_root).is_ok();
        return keep(raw, !under_mount && *mapping == HostMapping::Unmapped);
    }

    keep(&join_under(mount_root, candidate), false)
}

fn join_under(mount_root: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return mount_root.to_string();
    }
    format!("{}/{}", mount_root.trim_end_matches('/'), parts.join("/"))
}

/// Runs commands inside an already running container
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
    container_id: String,
    mount_root: String,
    mapping: HostMapping,
    runner: ProcessRunner,
}

impl EventEmitter for ContainerExecutor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.runner.event_sender()
    }
}

impl ContainerExecutor {
    pub fn new(
        runtime: impl Into<String>,
        container_id: impl Into<String>,
        mount_root: impl Into<String>,
        mapping: HostMapping,
        event_sender: Option<EventSender>,
    ) -> Self {
        let container_id = container_id.into();
        let runner = ProcessRunner::new(format!("container:{container_id}"), event_sender);
        Self {
            runtime: runtime.into(),
            container_id,
            mount_root: mount_root.into(),
            mapping,
            runner,
        }
    }

    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    #[must_use]
    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    #[must_use]
    pub fn mapping(&self) -> &HostMapping {
        &self.mapping
    }

    #[must_use]
    pub fn resolve_working_dir(&self, working_dir: Option<&str>) -> ResolvedPath {
        resolve_container_path(&self.mount_root, &self.mapping, working_dir)
    }

    /// Arguments passed to the runtime binary for one command
    ///
    /// `exec -w <dir> -e K=V ... <container> <command> <args...>`. A `marker`
    /// is exported as [`EXEC_MARKER_VAR`] so the command and its children can
    /// be found again inside the container.
    #[must_use]
    pub fn exec_argv(
        &self,
        command: &str,
        args: &[String],
        options: &CommandOptions,
        marker: Option<&str>,
    ) -> Vec<String> {
        let dir = self.resolve_working_dir(options.working_dir.as_deref());
        let mut argv = Vec::with_capacity(7 + options.env.len() * 2 + args.len());
        argv.push("exec".to_string());
        argv.push("-w".to_string());
        argv.push(dir.path);
        for (key, value) in &options.env {
            argv.push("-e".to_string());
            argv.push(format!("{key}={value}"));
        }
        if let Some(marker) = marker {
            argv.push("-e".to_string());
            argv.push(format!("{EXEC_MARKER_VAR}={marker}"));
        }
        argv.push(self.container_id.clone());
        argv.push(command.to_string());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Arguments that kill every container process carrying `marker`
    ///
    /// Killing the local `exec` client leaves the command running in the
    /// container, so a timed-out command is hunted down through `/proc`.
    #[must_use]
    pub fn kill_argv(&self, marker: &str) -> Vec<String> {
        let script = format!(
            "for p in /proc/[0-9]*; do \
             tr '\\0' '\\n' < \"$p/environ\" 2>/dev/null | grep -qx {} \
             && kill -9 \"${{p#/proc/}}\" 2>/dev/null; done; true",
            shell_quote(&format!("{EXEC_MARKER_VAR}={marker}"))
        );
        vec![
            "exec".to_string(),
            self.container_id.clone(),
            "sh".to_string(),
            "-c".to_string(),
            script,
        ]
    }

    async fn kill_marked(&self, marker: &str) {
        let mut cmd = PlatformCommand::new(&self.runtime);
        cmd.args(self.kill_argv(marker));
        match self.runner.run(&cmd, None, true).await {
            Ok(result) if result.success => {}
            Ok(result) => {
                tracing::warn!(
                    container = %self.container_id,
                    exit_code = result.exit_code,
                    "failed to stop timed-out command in container"
                );
            }
            Err(e) => {
                tracing::warn!(container = %self.container_id, error = %e, "failed to stop timed-out command in container");
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for ContainerExecutor {
    async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandResult, Error> {
        if let Some(dir) = options.working_dir.as_deref() {
            if self.resolve_working_dir(Some(dir)).unmapped_host_path {
                self.emit_warning_with_context(
                    format!("working directory {dir} passed to the container unchanged"),
                    "no host root mapping is configured for this executor",
                );
            }
        }

        let marker = options.timeout.map(|_| next_exec_marker());
        let mut cmd = PlatformCommand::new(&self.runtime);
        cmd.args(self.exec_argv(command, args, options, marker.as_deref()));

        let result = self.runner.run(&cmd, options.timeout, options.quiet).await?;
        if let Some(marker) = marker.as_deref() {
            if result.exit_code == TIMEOUT_EXIT_CODE {
                self.kill_marked(marker).await;
            }
        }
        Ok(result)
    }

    async fn is_available(&self, command: &str) -> bool {
        let mut cmd = PlatformCommand::new(&self.runtime);
        cmd.args(["exec", self.container_id.as_str(), "sh", "-c"])
            .arg(format!("command -v {}", shell_quote(command)));

        matches!(self.runner.run(&cmd, None, true).await, Ok(result) if result.success)
    }

    fn describe(&self) -> String {
        format!("container:{}", self.container_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped() -> HostMapping {
        HostMapping::Mapped(PathBuf::from("/home/dev/project"))
    }

    #[test]
    fn host_path_under_mapping_is_rebased() {
        let resolved = resolve_container_path("/app", &mapped(), Some("/home/dev/project/src/web"));
        assert_eq!(resolved.path, "/app/src/web");
        assert!(!resolved.unmapped_host_path);

        let root = resolve_container_path("/app", &mapped(), Some("/home/dev/project"));
        assert_eq!(root.path, "/app");
    }

    #[test]
    fn absolute_under_mount_root_is_unchanged() {
        let resolved = resolve_container_path("/app", &mapped(), Some("/app/tests"));
        assert_eq!(resolved.path, "/app/tests");
    }

    #[test]
    fn relative_and_missing_paths_join_mount_root() {
        assert_eq!(resolve_container_path("/app", &mapped(), Some("src")).path, "/app/src");
        assert_eq!(resolve_container_path("/app", &mapped(), Some("./src")).path, "/app/src");
        assert_eq!(resolve_container_path("/app", &mapped(), None).path, "/app");
    }

    #[test]
    fn other_absolute_paths_pass_through() {
        let resolved = resolve_container_path("/app", &mapped(), Some("/tmp/out"));
        assert_eq!(resolved.path, "/tmp/out");
        assert!(!resolved.unmapped_host_path);
    }

    #[test]
    fn unmapped_executor_flags_host_looking_paths() {
        let resolved =
            resolve_container_path("/app", &HostMapping::Unmapped, Some("/home/dev/project/src"));
        assert_eq!(resolved.path, "/home/dev/project/src");
        assert!(resolved.unmapped_host_path);

        let inside = resolve_container_path("/app", &HostMapping::Unmapped, Some("/app/src"));
        assert!(!inside.unmapped_host_path);
    }

    #[test]
    fn mount_root_prefix_is_component_wise() {
        let resolved = resolve_container_path("/app", &HostMapping::Unmapped, Some("/application"));
        assert!(resolved.unmapped_host_path);
    }

    #[test]
    fn exec_argv_matches_runtime_contract() {
        let executor = ContainerExecutor::new("docker", "abc123", "/app", mapped(), None);
        let options = CommandOptions::new().with_env("KEY", "value");
        let argv = executor.exec_argv("dotnet", &["build".to_string()], &options, None);
        assert_eq!(
            argv,
            vec!["exec", "-w", "/app", "-e", "KEY=value", "abc123", "dotnet", "build"]
        );
    }

    #[test]
    fn marked_exec_exports_the_marker_last() {
        let executor = ContainerExecutor::new("docker", "abc123", "/app", mapped(), None);
        let argv = executor.exec_argv("sleep", &["60".to_string()], &CommandOptions::new(), Some("7-1"));
        assert_eq!(
            argv,
            vec!["exec", "-w", "/app", "-e", "STEVEDORE_EXEC_ID=7-1", "abc123", "sleep", "60"]
        );
    }

    #[test]
    fn kill_argv_targets_the_marker_inside_the_container() {
        let executor = ContainerExecutor::new("docker", "abc123", "/app", mapped(), None);
        let argv = executor.kill_argv("7-1");
        assert_eq!(&argv[..4], &["exec", "abc123", "sh", "-c"]);
        assert!(argv[4].contains("grep -qx STEVEDORE_EXEC_ID=7-1 "));
        assert!(argv[4].contains("kill -9"));
    }

    #[test]
    fn markers_are_unique_per_command() {
        assert_ne!(next_exec_marker(), next_exec_marker());
    }
}
