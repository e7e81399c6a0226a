//! Container lifecycle: reuse or create, sync, lease, release

use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use stevedore_config::{ContainerConfig, TransferMode};
use stevedore_errors::Error;
use stevedore_events::{AppEvent, ContainerEvent, EventEmitter, EventSender};
use stevedore_platform::{ContainerExecutor, HostMapping, SharedExecutor};
use stevedore_types::ProjectDir;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::identity::ProjectIdentity;
use crate::runtime::{BindMount, ContainerRuntime, ContainerSpec, DockerCli, RunningContainer};
use crate::snapshot::snapshot;
use crate::transfer::Transfer;

/// The container a run executes in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub mount_root: String,
    /// Host directory mapped onto `mount_root`
    pub host_root: Option<PathBuf>,
    /// Whether an existing warm container was picked up
    pub reused: bool,
}

/// Creates, reuses and removes per-project build containers
#[derive(Debug, Clone)]
pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
    config: ContainerConfig,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for ContainerManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ContainerManager {
    /// Manager driving the configured runtime binary
    #[must_use]
    pub fn new(config: ContainerConfig, event_sender: Option<EventSender>) -> Self {
        let runtime = Arc::new(DockerCli::new(&config.runtime, event_sender.clone()));
        Self::with_runtime(config, runtime, event_sender)
    }

    #[must_use]
    pub fn with_runtime(
        config: ContainerConfig,
        runtime: Arc<dyn ContainerRuntime>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            runtime,
            config,
            locks: Arc::new(DashMap::new()),
            event_sender,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self, project: &ProjectDir) -> ProjectIdentity {
        ProjectIdentity::compute(project, &self.config.image, &self.config.mount_root)
    }

    async fn lock(&self, identity: &ProjectIdentity) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(identity.key().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Get a synced container for the project
    ///
    /// With warm reuse enabled and no cold start, a running container with
    /// the project's label is reused. Otherwise any existing one is removed
    /// and a fresh container is created. Project files are synced either way;
    /// a reused container also loses the files deleted on the host since its
    /// last sync.
    /// Decisions for one project are serialized; the lease holds the lock
    /// until it is released or dropped.
    ///
    /// # Errors
    ///
    /// Returns a container error if the runtime is unreachable, creation
    /// fails, or files cannot be synced. A container created by this call
    /// is removed again when syncing fails.
    pub async fn acquire(&self, project: &ProjectDir, cold_start: bool) -> Result<ContainerLease, Error> {
        let identity = self.identity(project);
        let guard = self.lock(&identity).await;
        let label = identity.label();

        let existing = self.runtime.find_running(&label).await?;
        let (running, reused) = match existing {
            Some(found) if self.config.warm && !cold_start => {
                self.emit(AppEvent::Container(ContainerEvent::Reused {
                    id: found.id.clone(),
                    name: found.name.clone(),
                }));
                (found, true)
            }
            stale => {
                if let Some(old) = stale {
                    self.remove(&old.id).await?;
                }
                // a stopped container would still hold the name
                self.runtime.remove(&identity.container_name()).await?;
                (self.create(project, &identity, label).await?, false)
            }
        };

        if let Err(err) = self.sync(project, &running.id, reused).await {
            if !reused {
                if let Err(cleanup) = self.remove(&running.id).await {
                    tracing::warn!(container = %running.id, error = %cleanup, "failed to remove container after sync failure");
                }
            }
            return Err(err);
        }

        let executor = ContainerExecutor::new(
            self.runtime.binary(),
            running.id.clone(),
            self.config.mount_root.clone(),
            HostMapping::Mapped(project.path().to_path_buf()),
            self.event_sender.clone(),
        );

        Ok(ContainerLease {
            handle: ContainerHandle {
                id: running.id,
                name: running.name,
                mount_root: self.config.mount_root.clone(),
                host_root: Some(project.path().to_path_buf()),
                reused,
            },
            executor: Arc::new(executor),
            runtime: Arc::clone(&self.runtime),
            warm: self.config.warm,
            keep: false,
            event_sender: self.event_sender.clone(),
            _guard: guard,
        })
    }

    /// Remove the project's warm container, if any
    ///
    /// Returns whether a container was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be reached.
    pub async fn cleanup(&self, project: &ProjectDir) -> Result<bool, Error> {
        let identity = self.identity(project);
        let _guard = self.lock(&identity).await;

        match self.runtime.find_running(&identity.label()).await? {
            Some(found) => {
                self.remove(&found.id).await?;
                Ok(true)
            }
            None => {
                self.runtime.remove(&identity.container_name()).await?;
                Ok(false)
            }
        }
    }

    async fn create(
        &self,
        project: &ProjectDir,
        identity: &ProjectIdentity,
        label: String,
    ) -> Result<RunningContainer, Error> {
        let mut mounts = Vec::new();
        if self.config.transfer == TransferMode::FileList {
            mounts.push(BindMount {
                host: project.path().to_path_buf(),
                container: self.config.source_mount.clone(),
                read_only: true,
            });
        }

        let spec = ContainerSpec {
            name: identity.container_name(),
            image: self.config.image.clone(),
            labels: vec![label],
            mounts,
            workdir: self.config.mount_root.clone(),
        };
        let id = self.runtime.create(&spec).await?;

        self.emit(AppEvent::Container(ContainerEvent::Created {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image,
        }));

        Ok(RunningContainer { id, name: spec.name })
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        self.runtime.remove(id).await?;
        self.emit(AppEvent::Container(ContainerEvent::Removed { id: id.to_string() }));
        Ok(())
    }

    async fn sync(&self, project: &ProjectDir, id: &str, reused: bool) -> Result<(), Error> {
        let snapshot = snapshot(project.path(), self.config.non_repo_policy).await?;
        self.emit(AppEvent::Container(ContainerEvent::SnapshotComputed {
            root: snapshot.root.clone(),
            files: snapshot.len(),
            git_aware: snapshot.git_aware,
        }));

        let transfer = Transfer {
            runtime: self.runtime.as_ref(),
            container_id: id,
            mount_root: &self.config.mount_root,
            source_mount: &self.config.source_mount,
            prune_stale: reused,
        };
        let report = transfer.sync(&snapshot, self.config.transfer).await?;

        for name in &report.skipped {
            self.emit_warning_with_context(
                format!("skipped {:?}: file name contains a newline", name.display().to_string()),
                "the container's tar does not support --null file lists",
            );
        }
        self.emit(AppEvent::Container(ContainerEvent::Synced {
            container: id.to_string(),
            mode: report.mode.to_string(),
            files: report.files,
            skipped: report.skipped.len(),
            removed: report.removed,
            duration: report.duration,
        }));
        Ok(())
    }
}

/// Exclusive use of a project's container for one run
///
/// Dropping the lease releases the per-project lock but leaves the
/// container running; call [`ContainerLease::release`] to apply the warm
/// policy.
#[derive(Debug)]
pub struct ContainerLease {
    handle: ContainerHandle,
    executor: Arc<ContainerExecutor>,
    runtime: Arc<dyn ContainerRuntime>,
    warm: bool,
    keep: bool,
    event_sender: Option<EventSender>,
    _guard: OwnedMutexGuard<()>,
}

impl EventEmitter for ContainerLease {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ContainerLease {
    #[must_use]
    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    /// Executor running commands in this container
    #[must_use]
    pub fn executor(&self) -> SharedExecutor {
        Arc::clone(&self.executor) as SharedExecutor
    }

    /// Keep the container after release even when warm reuse is off
    pub fn keep(&mut self, keep: bool) {
        self.keep = keep;
    }

    /// End the run: remove the container unless it is warm or kept
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    pub async fn release(self) -> Result<(), Error> {
        if self.warm || self.keep {
            return Ok(());
        }
        self.runtime.remove(&self.handle.id).await?;
        self.emit(AppEvent::Container(ContainerEvent::Removed {
            id: self.handle.id.clone(),
        }));
        Ok(())
    }
}
