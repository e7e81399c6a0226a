//! Version-control aware list of the project files to copy into a container

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use stevedore_config::NonRepoPolicy;
use stevedore_errors::{ContainerError, Error};

/// Files to transfer, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub root: PathBuf,
    /// Sorted, relative, never containing `.git`
    pub files: Vec<PathBuf>,
    /// Whether git ignore rules were applied
    pub git_aware: bool,
}

impl Snapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Top of the git work tree containing `root`, if any
///
/// `.git` may be a directory or, for worktrees and submodules, a file.
#[must_use]
pub fn enclosing_work_tree(root: &Path) -> Option<&Path> {
    root.ancestors().find(|dir| dir.join(".git").exists())
}

/// Walk the project and collect the files a build needs
///
/// Inside a git work tree (the project root itself or any ancestor) this
/// honours `.gitignore` files from the work tree top down, `.git/info/exclude`
/// and the user's global excludes. Hidden files are kept; `.git` never is.
/// Outside a repository the policy decides between copying everything and
/// refusing.
///
/// # Errors
///
/// Returns `NotARepository` under `NonRepoPolicy::Fail`, or `SnapshotFailed`
/// if the directory cannot be walked.
pub fn compute_snapshot(root: &Path, policy: NonRepoPolicy) -> Result<Snapshot, ContainerError> {
    let work_tree = enclosing_work_tree(root);
    let git_aware = work_tree.is_some();
    if !git_aware && policy == NonRepoPolicy::Fail {
        return Err(ContainerError::NotARepository {
            path: root.display().to_string(),
        });
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .parents(git_aware)
        .ignore(false)
        .follow_links(false)
        .git_ignore(git_aware)
        .git_exclude(git_aware)
        .git_global(git_aware)
        .filter_entry(|entry| entry.file_name() != ".git");

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|e| ContainerError::SnapshotFailed {
            path: root.display().to_string(),
            message: e.to_string(),
        })?;
        let is_leaf = entry
            .file_type()
            .is_some_and(|t| t.is_file() || t.is_symlink());
        if !is_leaf {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();

    if let Some(top) = work_tree {
        tracing::debug!(root = %root.display(), work_tree = %top.display(), files = files.len(), "git-aware snapshot");
    }

    Ok(Snapshot {
        root: root.to_path_buf(),
        files,
        git_aware,
    })
}

/// Run [`compute_snapshot`] off the async runtime
///
/// # Errors
///
/// Same as [`compute_snapshot`].
pub async fn snapshot(root: &Path, policy: NonRepoPolicy) -> Result<Snapshot, Error> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || compute_snapshot(&root, policy))
        .await
        .map_err(|e| Error::internal(format!("snapshot task failed: {e}")))?
        .map_err(Into::into)
}
