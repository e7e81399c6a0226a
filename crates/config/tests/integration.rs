//! Integration tests for config

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use stevedore_config::*;
    use tempfile::{NamedTempFile, TempDir};

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
script = "ci/build.star"

[container]
runtime = "podman"
image = "mcr.microsoft.com/dotnet/sdk:8.0"
warm = false
transfer = "archive"
non_repo_policy = "fail"

[execution]
default_timeout_ms = 60000
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.script.to_str(), Some("ci/build.star"));
        assert_eq!(config.container.runtime, "podman");
        assert!(!config.container.warm);
        assert!(config.container.enabled);
        assert_eq!(config.container.mount_root, "/workspace");
        assert_eq!(config.container.transfer, TransferMode::Archive);
        assert_eq!(config.container.non_repo_policy, NonRepoPolicy::Fail);
        assert_eq!(config.execution.default_timeout_ms, 60000);
    }

    #[tokio::test]
    async fn test_unknown_transfer_mode_is_a_parse_error() {
        let err = Config::from_toml("[container]\ntransfer = \"rsync\"\n").unwrap_err();
        assert!(matches!(
            err,
            stevedore_errors::Error::Config(stevedore_errors::ConfigError::ParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_discover_prefers_project_file() {
        let project = TempDir::new().unwrap();
        std::fs::write(
            project.path().join(PROJECT_CONFIG_FILE),
            "[container]\nimage = \"node:22\"\n",
        )
        .unwrap();

        let config = Config::discover(None, project.path()).await.unwrap();
        assert_eq!(config.container.image, "node:22");
    }

    #[tokio::test]
    async fn test_discover_missing_explicit_file_fails() {
        let project = TempDir::new().unwrap();
        let missing = project.path().join("nope.toml");
        assert!(Config::discover(Some(&missing), project.path()).await.is_err());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("STEVEDORE_RUNTIME");
        std::env::remove_var("STEVEDORE_CONTAINER");

        std::env::set_var("STEVEDORE_RUNTIME", "podman");
        std::env::set_var("STEVEDORE_CONTAINER", "false");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.container.runtime, "podman");
        assert!(!config.container.enabled);

        std::env::remove_var("STEVEDORE_RUNTIME");
        std::env::remove_var("STEVEDORE_CONTAINER");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("STEVEDORE_TIMEOUT_MS", "soon");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        std::env::remove_var("STEVEDORE_TIMEOUT_MS");
    }

    #[test]
    fn test_transfer_mode_from_str() {
        assert_eq!("archive".parse::<TransferMode>().unwrap(), TransferMode::Archive);
        assert!("zip".parse::<TransferMode>().is_err());
    }
}
