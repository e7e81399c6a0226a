//! Stable identity of a project's container

use blake3::Hasher;
use stevedore_types::ProjectDir;

/// Label key every stevedore container carries
pub const PROJECT_LABEL_KEY: &str = "stevedore.project";

/// Identity derived from the project directory, image and mount root
///
/// Two runs with the same inputs share a warm container; changing any
/// input yields a different container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectIdentity {
    digest: String,
}

impl ProjectIdentity {
    #[must_use]
    pub fn compute(project: &ProjectDir, image: &str, mount_root: &str) -> Self {
        let canonical = std::fs::canonicalize(project.path())
            .unwrap_or_else(|_| project.path().to_path_buf());

        let mut hasher = Hasher::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(image.as_bytes());
        hasher.update(&[0]);
        hasher.update(mount_root.as_bytes());

        Self {
            digest: hasher.finalize().to_hex().to_string(),
        }
    }

    /// Full hex digest, used as the lock key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.digest
    }

    /// `stevedore.project=<16 hex chars>`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{PROJECT_LABEL_KEY}={}", &self.digest[..16])
    }

    /// `stevedore-<12 hex chars>`
    #[must_use]
    pub fn container_name(&self) -> String {
        format!("stevedore-{}", &self.digest[..12])
    }
}
