//! Streaming project files into a container through `tar`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use stevedore_config::TransferMode;
use stevedore_errors::{ContainerError, Error};
use stevedore_platform::shell_quote;

use crate::runtime::ContainerRuntime;
use crate::snapshot::Snapshot;

/// Names synced by the previous transfer, one per line, kept in the container
pub const SYNC_MANIFEST: &str = "/tmp/.stevedore-synced";

/// What the container's `tar` can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveCapabilities {
    /// Accepts NUL-terminated names with `--null -T -`
    pub supports_null: bool,
}

impl ArchiveCapabilities {
    /// Read capabilities from `tar --help` output
    #[must_use]
    pub fn from_help(help: &str) -> Self {
        Self {
            supports_null: help.contains("--null"),
        }
    }
}

/// Outcome of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: TransferMode,
    pub files: usize,
    /// Names that could not be expressed in the list format
    pub skipped: Vec<PathBuf>,
    /// Previously synced files deleted because the host no longer has them
    pub removed: usize,
    pub duration: Duration,
}

/// Probe the container's `tar` for NUL-delimited list support
///
/// # Errors
///
/// Returns `ProbeFailed` when `tar` is missing or prints nothing.
pub async fn probe(runtime: &dyn ContainerRuntime, id: &str) -> Result<ArchiveCapabilities, Error> {
    let argv = vec![
        "sh".to_string(),
        "-c".to_string(),
        "tar --help 2>&1".to_string(),
    ];
    let result = runtime.exec_with_input(id, &argv, None).await?;
    let help = result.trimmed_output();
    if help.is_empty() {
        return Err(ContainerError::ProbeFailed {
            container: id.to_string(),
            message: result
                .error
                .unwrap_or_else(|| "tar --help produced no output".to_string()),
        }
        .into());
    }
    Ok(ArchiveCapabilities::from_help(help))
}

/// Encode relative file names as a `tar -T -` list
///
/// NUL-terminated when supported; otherwise newline-terminated, in which
/// case names containing a newline cannot be represented and are returned
/// as skipped.
#[must_use]
pub fn encode_file_list(files: &[PathBuf], supports_null: bool) -> (Vec<u8>, Vec<PathBuf>) {
    let mut list = Vec::new();
    let mut skipped = Vec::new();
    for file in files {
        let name = file.to_string_lossy();
        if supports_null {
            list.extend_from_slice(name.as_bytes());
            list.push(0);
        } else if name.contains('\n') {
            skipped.push(file.clone());
        } else {
            list.extend_from_slice(name.as_bytes());
            list.push(b'\n');
        }
    }
    (list, skipped)
}

/// Shell pipeline copying listed files from the bind mount into the mount root
#[must_use]
pub fn file_list_pipeline(source_mount: &str, mount_root: &str, supports_null: bool) -> String {
    let null = if supports_null { " --null" } else { "" };
    format!(
        "tar -C {} -cf -{null} -T - | tar -C {} -xf -",
        shell_quote(source_mount),
        shell_quote(mount_root)
    )
}

/// Newline-separated manifest of the synced names
///
/// Names containing a newline are left out and so are never pruned.
#[must_use]
pub fn encode_manifest(files: &[PathBuf]) -> Vec<u8> {
    let mut manifest = Vec::new();
    for file in files {
        let name = file.to_string_lossy();
        if !name.contains('\n') {
            manifest.extend_from_slice(name.as_bytes());
            manifest.push(b'\n');
        }
    }
    manifest
}

/// Names listed in `previous` that are absent from `files`
#[must_use]
pub fn stale_entries(previous: &str, files: &[PathBuf]) -> Vec<String> {
    let current: HashSet<String> = files
        .iter()
        .map(|f| f.to_string_lossy().into_owned())
        .collect();
    previous
        .lines()
        .filter(|line| !line.is_empty() && !current.contains(*line))
        .map(str::to_string)
        .collect()
}

/// Shell loop deleting the names read from stdin under `mount_root`
///
/// Directories left empty by a deletion are removed as well.
#[must_use]
pub fn prune_script(mount_root: &str) -> String {
    format!(
        "cd {} && while IFS= read -r f; do rm -f -- \"$f\"; rmdir -p \"$(dirname \"$f\")\" 2>/dev/null; done; true",
        shell_quote(mount_root)
    )
}

/// Build an uncompressed archive of the snapshot on the host
///
/// # Errors
///
/// Returns `TransferFailed` if a file cannot be read.
pub fn build_archive(root: &Path, files: &[PathBuf]) -> Result<Vec<u8>, ContainerError> {
    let failed = |message: String| ContainerError::TransferFailed {
        container: String::new(),
        message,
    };

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    for file in files {
        builder
            .append_path_with_name(root.join(file), file)
            .map_err(|e| failed(format!("{}: {e}", file.display())))?;
    }
    builder
        .into_inner()
        .map_err(|e| failed(format!("finishing archive: {e}")))
}

/// Copies a snapshot into a running container
#[derive(Debug, Clone)]
pub struct Transfer<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub container_id: &'a str,
    pub mount_root: &'a str,
    pub source_mount: &'a str,
    /// The container already holds an earlier sync whose leftovers are pruned
    pub prune_stale: bool,
}

impl Transfer<'_> {
    /// Copy the snapshot using `mode`
    ///
    /// With `prune_stale`, files recorded by the previous sync that are no
    /// longer in the snapshot are deleted first. Files the container created
    /// itself are never touched. The manifest is rewritten after every
    /// successful transfer.
    ///
    /// # Errors
    ///
    /// Returns `ProbeFailed` or `TransferFailed`, or the runtime's error if it
    /// cannot be reached.
    pub async fn sync(&self, snapshot: &Snapshot, mode: TransferMode) -> Result<SyncReport, Error> {
        let start = Instant::now();
        let removed = if self.prune_stale {
            self.prune(&snapshot.files).await?
        } else {
            0
        };

        let (argv, input, skipped) = match mode {
            TransferMode::FileList => {
                let caps = probe(self.runtime, self.container_id).await?;
                let (list, skipped) = encode_file_list(&snapshot.files, caps.supports_null);
                let pipeline =
                    file_list_pipeline(self.source_mount, self.mount_root, caps.supports_null);
                (shell(pipeline), list, skipped)
            }
            TransferMode::Archive => {
                let root = snapshot.root.clone();
                let files = snapshot.files.clone();
                let archive = tokio::task::spawn_blocking(move || build_archive(&root, &files))
                    .await
                    .map_err(|e| Error::internal(format!("archive task failed: {e}")))?
                    .map_err(|e| self.with_container(e))?;
                (
                    vec![
                        "tar".to_string(),
                        "-C".to_string(),
                        self.mount_root.to_string(),
                        "-xf".to_string(),
                        "-".to_string(),
                    ],
                    archive,
                    Vec::new(),
                )
            }
        };

        self.exec_checked(argv, input).await?;
        self.exec_checked(
            shell(format!("cat > {}", shell_quote(SYNC_MANIFEST))),
            encode_manifest(&snapshot.files),
        )
        .await?;

        Ok(SyncReport {
            mode,
            files: snapshot.len() - skipped.len(),
            skipped,
            removed,
            duration: start.elapsed(),
        })
    }

    /// Delete what the previous sync left behind; returns how many names
    async fn prune(&self, files: &[PathBuf]) -> Result<usize, Error> {
        let argv = shell(format!("cat {} 2>/dev/null || true", shell_quote(SYNC_MANIFEST)));
        let previous = self
            .runtime
            .exec_with_input(self.container_id, &argv, None)
            .await?;
        let stale = stale_entries(previous.output.as_deref().unwrap_or_default(), files);
        if stale.is_empty() {
            return Ok(0);
        }

        let mut list = stale.join("\n").into_bytes();
        list.push(b'\n');
        self.exec_checked(shell(prune_script(self.mount_root)), list)
            .await?;
        Ok(stale.len())
    }

    async fn exec_checked(&self, argv: Vec<String>, input: Vec<u8>) -> Result<(), Error> {
        let result = self
            .runtime
            .exec_with_input(self.container_id, &argv, Some(input))
            .await?;
        if result.success {
            return Ok(());
        }
        Err(ContainerError::TransferFailed {
            container: self.container_id.to_string(),
            message: result
                .error
                .unwrap_or_else(|| format!("exit code {}", result.exit_code)),
        }
        .into())
    }

    fn with_container(&self, err: ContainerError) -> ContainerError {
        match err {
            ContainerError::TransferFailed { message, .. } => ContainerError::TransferFailed {
                container: self.container_id.to_string(),
                message,
            },
            other => other,
        }
    }
}

fn shell(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_detects_null_support() {
        let gnu = "Usage: tar [OPTION...]\n      --null                 -T reads null-terminated names";
        let busybox = "Usage: tar c|x|t [-ZzJjahmvokO] [-f TARFILE] [-C DIR] [-T FILE]";
        assert!(ArchiveCapabilities::from_help(gnu).supports_null);
        assert!(!ArchiveCapabilities::from_help(busybox).supports_null);
    }

    #[test]
    fn null_list_keeps_every_name() {
        let files = vec![PathBuf::from("a.txt"), PathBuf::from("odd\nname")];
        let (list, skipped) = encode_file_list(&files, true);
        assert_eq!(list, b"a.txt\0odd\nname\0");
        assert!(skipped.is_empty());
    }

    #[test]
    fn newline_list_skips_names_with_newlines() {
        let files = vec![PathBuf::from("a.txt"), PathBuf::from("odd\nname"), PathBuf::from("b/c")];
        let (list, skipped) = encode_file_list(&files, false);
        assert_eq!(list, b"a.txt\nb/c\n");
        assert_eq!(skipped, vec![PathBuf::from("odd\nname")]);
    }

    #[test]
    fn pipeline_adds_null_flag_only_when_supported() {
        assert_eq!(
            file_list_pipeline("/mnt/stevedore-src", "/workspace", true),
            "tar -C /mnt/stevedore-src -cf - --null -T - | tar -C /workspace -xf -"
        );
        assert_eq!(
            file_list_pipeline("/mnt/stevedore-src", "/workspace", false),
            "tar -C /mnt/stevedore-src -cf - -T - | tar -C /workspace -xf -"
        );
    }

    #[test]
    fn stale_entries_are_previous_names_missing_now() {
        let files = vec![PathBuf::from("src/main.cs"), PathBuf::from("app.csproj")];
        let previous = "app.csproj\nsrc/old.cs\nsrc/main.cs\n\ndocs/readme.md\n";
        assert_eq!(
            stale_entries(previous, &files),
            vec!["src/old.cs".to_string(), "docs/readme.md".to_string()]
        );
        assert!(stale_entries("", &files).is_empty());
    }

    #[test]
    fn manifest_leaves_out_names_with_newlines() {
        let files = vec![PathBuf::from("a.txt"), PathBuf::from("odd\nname"), PathBuf::from("b/c")];
        assert_eq!(encode_manifest(&files), b"a.txt\nb/c\n");
    }

    #[test]
    fn prune_script_runs_under_the_mount_root() {
        let script = prune_script("/workspace");
        assert!(script.starts_with("cd /workspace && while IFS= read -r f; do rm -f -- \"$f\";"));
    }

    #[test]
    fn archive_contains_snapshot_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let files = vec![PathBuf::from("Cargo.toml"), PathBuf::from("src/lib.rs")];
        let bytes = build_archive(dir.path(), &files).unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Cargo.toml", "src/lib.rs"]);
    }
}
