//! stevedore - scripted builds in reusable containers
//!
//! This is the CLI application: it loads configuration, compiles the build
//! script, acquires a container when one is configured and runs the
//! registered steps, turning library events into log records.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use crate::display::{OperationResult, OutputRenderer};
use crate::error::CliError;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use stevedore_config::Config;
use stevedore_container::{ContainerLease, ContainerManager};
use stevedore_errors::{Error, WorkflowError};
use stevedore_events::{EventReceiver, EventSender};
use stevedore_platform::{LocalExecutor, SharedExecutor};
use stevedore_script::{ExecutorBindings, ScriptHost, ScriptOptions, ScriptSource};
use stevedore_types::ProjectDir;
use stevedore_workflow::{StepRegistry, ToolCheckerRegistry, WorkflowResult, WorkflowRunner};
use tokio::select;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(e.exit_code());
    }
}

/// Everything a command needs once configuration is settled
struct AppContext {
    config: Config,
    project: ProjectDir,
    event_sender: EventSender,
}

impl AppContext {
    /// Script path from the command line or config, relative to the project
    fn script_path(&self, script: Option<PathBuf>) -> PathBuf {
        let script = script.unwrap_or_else(|| self.config.general.script.clone());
        if script.is_absolute() {
            script
        } else {
            self.project.join(script)
        }
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting stevedore v{}", env!("CARGO_PKG_VERSION"));

    let project = resolve_project(cli.global.project.as_deref())?;

    // Defaults, then file, then environment, then flags
    let mut config = Config::discover(cli.global.config.as_deref(), project.path()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.command);
    config.validate()?;

    let (event_sender, event_receiver) = stevedore_events::channel();
    let renderer = OutputRenderer::new(cli.global.json, cli.global.color);

    let ctx = AppContext {
        config,
        project,
        event_sender,
    };
    let result = execute_command_with_events(cli.command, ctx, event_receiver).await?;

    renderer.render_result(&result)?;

    if let OperationResult::Workflow(workflow) = &result {
        if let Some(error) = failure_error(workflow) {
            return Err(Error::from(error).into());
        }
    }

    info!("Command completed successfully");
    Ok(())
}

fn resolve_project(explicit: Option<&Path>) -> Result<ProjectDir, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    if !path.is_dir() {
        return Err(CliError::InvalidArguments(format!(
            "project directory {} does not exist",
            path.display()
        )));
    }
    ProjectDir::canonical(&path).map_err(|e| CliError::Run(Error::io_with_path(&e, &path)))
}

/// Apply CLI flags on top of file and environment configuration
fn apply_cli_config(config: &mut Config, command: &Commands) {
    if let Commands::Run { local: true, .. } = command {
        config.container.enabled = false;
    }
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    ctx: AppContext,
    mut event_receiver: EventReceiver,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, ctx));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    logging::log_event(&event);
                }
                return result;
            }

            Some(event) = event_receiver.recv() => {
                logging::log_event(&event);
            }

            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling the run");
                while let Ok(event) = event_receiver.try_recv() {
                    logging::log_event(&event);
                }
                return Err(Error::Cancelled.into());
            }
        }
    }
}

async fn execute_command(command: Commands, ctx: AppContext) -> Result<OperationResult, CliError> {
    match command {
        Commands::Run {
            script,
            local: _,
            cold,
            keep,
        } => run_workflow(&ctx, script, cold, keep).await,
        Commands::Verify { script } => {
            let source = ScriptSource::read(&ctx.script_path(script)).await?;
            let summary = script_host(&ctx).load_and_verify(&source)?;
            Ok(OperationResult::Verified(summary))
        }
        Commands::Clean => {
            let manager =
                ContainerManager::new(ctx.config.container.clone(), Some(ctx.event_sender.clone()));
            let removed = manager.cleanup(&ctx.project).await?;
            Ok(OperationResult::Cleaned { removed })
        }
    }
}

fn script_host(ctx: &AppContext) -> ScriptHost {
    ScriptHost::new(
        ScriptOptions::new(ctx.project.clone()).with_default_timeout(ctx.config.default_timeout()),
    )
}

/// Compile, acquire a container if enabled, register and run
async fn run_workflow(
    ctx: &AppContext,
    script: Option<PathBuf>,
    cold: bool,
    keep: bool,
) -> Result<OperationResult, CliError> {
    let source = ScriptSource::read(&ctx.script_path(script)).await?;
    let host = script_host(ctx);

    // A script that does not compile never touches the container
    let compiled = host.compile(&source)?;

    let local: SharedExecutor = Arc::new(LocalExecutor::new(
        ctx.project.path(),
        Some(ctx.event_sender.clone()),
    ));
    let mut bindings = ExecutorBindings::local(local);

    let lease = if ctx.config.container.enabled {
        let manager =
            ContainerManager::new(ctx.config.container.clone(), Some(ctx.event_sender.clone()));
        let mut lease = manager.acquire(&ctx.project, cold).await?;
        lease.keep(keep);
        bindings = bindings.with_container(lease.executor());
        Some(lease)
    } else {
        None
    };

    let mut registry = StepRegistry::new();
    if let Err(e) = host.register(&compiled, bindings, &mut registry) {
        release(lease).await;
        return Err(e.into());
    }

    let tools = ToolCheckerRegistry::with_defaults(lease.as_ref().map(ContainerLease::executor));
    let mut runner = WorkflowRunner::new(tools, Some(ctx.event_sender.clone()));
    let result = runner
        .run(&host.workflow_name(&compiled), registry.take())
        .await;

    if let Some(lease) = lease {
        lease.release().await?;
    }
    Ok(OperationResult::Workflow(result))
}

/// Release a lease on an error path
async fn release(lease: Option<ContainerLease>) {
    if let Some(lease) = lease {
        if let Err(e) = lease.release().await {
            warn!(error = %e, "failed to release container");
        }
    }
}

/// The error a failed run exits with
fn failure_error(result: &WorkflowResult) -> Option<WorkflowError> {
    if result.success {
        return None;
    }
    let failed = result.failed_step()?;
    Some(WorkflowError::StepFailed {
        name: failed.name.clone(),
        context: failed.context.clone(),
        message: failed.error.clone().unwrap_or_default(),
    })
}

/// Initialize tracing/logging
///
/// Logs go to stderr so that `--json` output on stdout stays parseable.
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(debug_enabled)
            .with_env_filter(filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stevedore_workflow::StepResult;

    fn context_for(dir: &Path) -> AppContext {
        let (event_sender, _) = stevedore_events::channel();
        AppContext {
            config: Config::default(),
            project: ProjectDir::new(dir),
            event_sender,
        }
    }

    #[test]
    fn relative_scripts_resolve_against_the_project() {
        let ctx = context_for(Path::new("/src/api"));
        assert_eq!(ctx.script_path(None), PathBuf::from("/src/api/build.star"));
        assert_eq!(
            ctx.script_path(Some(PathBuf::from("ci/release.star"))),
            PathBuf::from("/src/api/ci/release.star")
        );
        assert_eq!(
            ctx.script_path(Some(PathBuf::from("/tmp/other.star"))),
            PathBuf::from("/tmp/other.star")
        );
    }

    #[test]
    fn local_flag_disables_the_container() {
        let cli = Cli::parse_from(["stevedore", "run", "--local"]);
        let mut config = Config::default();
        apply_cli_config(&mut config, &cli.command);
        assert!(!config.container.enabled);
    }

    #[test]
    fn failed_run_maps_to_step_failed() {
        let result = WorkflowResult {
            run_id: uuid::Uuid::new_v4(),
            workflow_name: "api".into(),
            started_at: chrono::Utc::now(),
            success: false,
            duration: Duration::from_millis(5),
            step_results: vec![
                StepResult::succeeded("A", None, Duration::ZERO),
                StepResult::failed(
                    "B",
                    Some("App.csproj".into()),
                    Duration::ZERO,
                    "exited with code 1",
                    None,
                ),
            ],
        };

        match failure_error(&result) {
            Some(WorkflowError::StepFailed { name, context, message }) => {
                assert_eq!(name, "B");
                assert_eq!(context.as_deref(), Some("App.csproj"));
                assert_eq!(message, "exited with code 1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_lists_steps_from_a_project_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("build.star"),
            "def build(ctx):\n    cargo(ctx, \"build\")\n    log(ctx, \"done\")\n",
        )
        .unwrap();

        let ctx = context_for(dir.path());
        let result = execute_command(Commands::Verify { script: None }, ctx)
            .await
            .unwrap();

        match result {
            OperationResult::Verified(summary) => {
                let names: Vec<&str> = summary.steps.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["Cargo.Build", "Log"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_run_executes_on_the_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("build.star"),
            "def build(ctx):\n    shell(ctx, \"true\")\n    shell(ctx, \"false\")\n    shell(ctx, \"true\")\n",
        )
        .unwrap();

        let mut ctx = context_for(dir.path());
        ctx.config.container.enabled = false;
        let result = run_workflow(&ctx, None, false, false).await.unwrap();

        match result {
            OperationResult::Workflow(workflow) => {
                assert!(!workflow.success);
                assert_eq!(workflow.steps_run(), 2);
                assert_eq!(workflow.steps_failed(), 1);
                assert!(failure_error(&workflow).is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
