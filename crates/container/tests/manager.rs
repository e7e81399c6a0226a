//! Lifecycle tests against a recording fake runtime

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stevedore_config::{ContainerConfig, NonRepoPolicy, TransferMode};
use stevedore_container::*;
use stevedore_errors::{ContainerError, Error};
use stevedore_events::{AppEvent, ContainerEvent};
use stevedore_types::{CommandResult, ProjectDir};
use tempfile::TempDir;

const GNU_TAR_HELP: &str = "Usage: tar [OPTION...] [FILE]...\n      --null    -T reads null-terminated names\n";

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<String>,
    running: Option<RunningContainer>,
    stdin: Vec<Vec<u8>>,
    manifest: Option<String>,
    pruned: Vec<String>,
    fail_transfer: bool,
    created: usize,
}

#[derive(Debug, Default, Clone)]
struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn with_running(id: &str) -> Self {
        let runtime = Self::default();
        runtime.state.lock().unwrap().running = Some(RunningContainer {
            id: id.into(),
            name: "stevedore-existing".into(),
        });
        runtime
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn binary(&self) -> &str {
        "fake"
    }

    async fn find_running(&self, label: &str) -> Result<Option<RunningContainer>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("find {label}"));
        Ok(state.running.clone())
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("remove {id}"));
        if state.running.as_ref().is_some_and(|c| c.id == id) {
            state.running = None;
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        let id = format!("c{}", state.created);
        state.calls.push(format!("create {} {}", spec.name, spec.image));
        state.running = Some(RunningContainer {
            id: id.clone(),
            name: spec.name.clone(),
        });
        Ok(id)
    }

    async fn exec_with_input(
        &self,
        id: &str,
        argv: &[String],
        stdin: Option<Vec<u8>>,
    ) -> Result<CommandResult, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("exec {id} {}", argv.join(" ")));
        let script = argv.last().map(String::as_str).unwrap_or_default();
        if script.contains("--help") {
            return Ok(CommandResult::from_exit(0, Some(GNU_TAR_HELP.into()), None));
        }
        if script.starts_with("cat /tmp/.stevedore-synced") {
            return Ok(CommandResult::from_exit(0, state.manifest.clone(), None));
        }
        if script.starts_with("cat > /tmp/.stevedore-synced") {
            state.manifest = stdin.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            return Ok(CommandResult::from_exit(0, None, None));
        }
        if script.contains("rm -f --") {
            let list = stdin.unwrap_or_default();
            state
                .pruned
                .extend(String::from_utf8_lossy(&list).lines().map(str::to_string));
            return Ok(CommandResult::from_exit(0, None, None));
        }
        if let Some(input) = stdin {
            state.stdin.push(input);
        }
        if state.fail_transfer {
            return Ok(CommandResult::from_exit(2, None, Some("tar: disk full".into())));
        }
        Ok(CommandResult::from_exit(0, None, None))
    }
}

fn project() -> (TempDir, ProjectDir) {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
    std::fs::write(dir.path().join("app.csproj"), "<Project />").unwrap();
    std::fs::write(dir.path().join("debug.log"), "noise").unwrap();
    let project = ProjectDir::new(dir.path());
    (dir, project)
}

fn config(warm: bool) -> ContainerConfig {
    ContainerConfig {
        warm,
        ..ContainerConfig::default()
    }
}

#[tokio::test]
async fn cold_start_creates_and_syncs_file_list() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    let (tx, mut rx) = stevedore_events::channel();
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), Some(tx));

    let lease = manager.acquire(&project, false).await.unwrap();
    assert!(!lease.handle().reused);
    assert_eq!(lease.handle().id, "c1");
    assert_eq!(lease.handle().mount_root, "/workspace");
    assert_eq!(lease.executor().describe(), "container:c1");

    let calls = runtime.calls();
    assert!(calls.iter().any(|c| c.starts_with("create stevedore-")));
    assert!(calls
        .iter()
        .any(|c| c.contains("tar -C /mnt/stevedore-src -cf - --null -T - | tar -C /workspace -xf -")));

    let state = runtime.state.lock().unwrap();
    assert_eq!(state.stdin, vec![b".gitignore\0app.csproj\0".to_vec()]);
    assert_eq!(state.manifest.as_deref(), Some(".gitignore\napp.csproj\n"));
    assert!(!calls.iter().any(|c| c.contains("cat /tmp/.stevedore-synced")));
    drop(state);

    let mut synced = None;
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::Container(ContainerEvent::Synced { files, .. }) = event {
            synced = Some(files);
        }
    }
    assert_eq!(synced, Some(2));
}

#[tokio::test]
async fn warm_container_is_reused() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::with_running("warm1");
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), None);

    let lease = manager.acquire(&project, false).await.unwrap();
    assert!(lease.handle().reused);
    assert_eq!(lease.handle().id, "warm1");
    assert!(!runtime.calls().iter().any(|c| c.starts_with("create")));

    lease.release().await.unwrap();
    assert!(!runtime.calls().iter().any(|c| c == "remove warm1"));
}

#[tokio::test]
async fn warm_sync_deletes_files_removed_on_the_host() {
    let (dir, project) = project();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/Old.cs"), "class Old {}").unwrap();
    let runtime = FakeRuntime::default();
    let (tx, mut rx) = stevedore_events::channel();
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), Some(tx));

    manager.acquire(&project, false).await.unwrap().release().await.unwrap();
    assert!(runtime.state.lock().unwrap().pruned.is_empty());

    std::fs::remove_file(dir.path().join("src/Old.cs")).unwrap();
    std::fs::write(dir.path().join("New.cs"), "class New {}").unwrap();
    let lease = manager.acquire(&project, false).await.unwrap();
    assert!(lease.handle().reused);

    let state = runtime.state.lock().unwrap();
    assert_eq!(state.pruned, vec!["src/Old.cs"]);
    assert_eq!(state.manifest.as_deref(), Some(".gitignore\nNew.cs\napp.csproj\n"));
    drop(state);

    let calls = runtime.calls();
    let prune = calls.iter().position(|c| c.contains("rm -f --")).unwrap();
    let extract = calls.iter().rposition(|c| c.contains("tar -C /workspace -xf -")).unwrap();
    assert!(prune < extract);
    assert!(calls[prune].starts_with("exec c1 sh -c cd /workspace && "));

    let mut removed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::Container(ContainerEvent::Synced { removed: count, .. }) = event {
            removed.push(count);
        }
    }
    assert_eq!(removed, vec![0, 1]);
}

#[tokio::test]
async fn cold_flag_replaces_warm_container() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::with_running("warm1");
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), None);

    let lease = manager.acquire(&project, true).await.unwrap();
    assert!(!lease.handle().reused);
    assert!(runtime.calls().iter().any(|c| c == "remove warm1"));
}

#[tokio::test]
async fn non_warm_lease_removes_container_on_release() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    let manager = ContainerManager::with_runtime(config(false), Arc::new(runtime.clone()), None);

    let lease = manager.acquire(&project, false).await.unwrap();
    lease.release().await.unwrap();
    assert_eq!(runtime.calls().last().map(String::as_str), Some("remove c1"));
}

#[tokio::test]
async fn kept_lease_survives_release() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    let manager = ContainerManager::with_runtime(config(false), Arc::new(runtime.clone()), None);

    let mut lease = manager.acquire(&project, false).await.unwrap();
    lease.keep(true);
    lease.release().await.unwrap();
    assert!(!runtime.calls().iter().any(|c| c == "remove c1"));
}

#[tokio::test]
async fn failed_transfer_removes_fresh_container() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    runtime.state.lock().unwrap().fail_transfer = true;
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), None);

    let err = manager.acquire(&project, false).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Container(ContainerError::TransferFailed { .. })
    ));
    assert_eq!(runtime.calls().last().map(String::as_str), Some("remove c1"));
}

#[tokio::test]
async fn archive_mode_streams_host_built_tar() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    let config = ContainerConfig {
        transfer: TransferMode::Archive,
        ..ContainerConfig::default()
    };
    let manager = ContainerManager::with_runtime(config, Arc::new(runtime.clone()), None);

    manager.acquire(&project, false).await.unwrap();

    assert!(runtime
        .calls()
        .iter()
        .any(|c| c == "exec c1 tar -C /workspace -xf -"));
    let stdin = runtime.state.lock().unwrap().stdin.clone();
    let mut archive = tar::Archive::new(stdin[0].as_slice());
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![".gitignore", "app.csproj"]);
}

#[tokio::test]
async fn non_repository_policy_fail_aborts_before_any_step() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "x").unwrap();
    let runtime = FakeRuntime::default();
    let config = ContainerConfig {
        non_repo_policy: NonRepoPolicy::Fail,
        ..ContainerConfig::default()
    };
    let manager = ContainerManager::with_runtime(config, Arc::new(runtime), None);

    let err = manager
        .acquire(&ProjectDir::new(dir.path()), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Container(ContainerError::NotARepository { .. })
    ));
}

#[tokio::test]
async fn acquisitions_for_one_project_are_serialized() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::default();
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), None);

    let first = manager.acquire(&project, false).await.unwrap();

    let second_manager = manager.clone();
    let second_project = project.clone();
    let second = tokio::spawn(async move { second_manager.acquire(&second_project, false).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!second.is_finished());

    first.release().await.unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(second.handle().reused);
}

#[tokio::test]
async fn cleanup_removes_running_container() {
    let (_dir, project) = project();
    let runtime = FakeRuntime::with_running("warm1");
    let manager = ContainerManager::with_runtime(config(true), Arc::new(runtime.clone()), None);

    assert!(manager.cleanup(&project).await.unwrap());
    assert!(!manager.cleanup(&project).await.unwrap());
}
