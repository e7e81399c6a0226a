//! Project directory handle

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The directory a build runs against
///
/// Deliberately has no `Display` or `Deref<Target = Path>`; callers pick
/// `path()` or `display_name()` explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectDir {
    path: PathBuf,
}

impl ProjectDir {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Canonicalise the directory, failing if it does not exist
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the path cannot be resolved.
    pub fn canonical(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::canonicalize(path)?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the default workflow name
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_last_component() {
        let dir = ProjectDir::new("/src/checkout/my-service");
        assert_eq!(dir.display_name(), "my-service");
        assert_eq!(dir.path(), Path::new("/src/checkout/my-service"));
    }

    #[test]
    fn display_name_of_root_falls_back_to_full_path() {
        assert_eq!(ProjectDir::new("/").display_name(), "/");
    }
}
