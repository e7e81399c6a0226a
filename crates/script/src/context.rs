//! Build context handed to a script's `build(ctx)` function

use allocative::Allocative;
use indexmap::IndexMap;
use starlark::values::{AllocValue, Heap, ProvidesStaticType, StarlarkValue, Value};
use starlark_derive::{starlark_value, NoSerialize};
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stevedore_errors::ScriptError;
use stevedore_platform::{DetachedExecutor, SharedExecutor};
use stevedore_types::{CommandOptions, Deferred, ExecutorKind, LogLevel};
use stevedore_workflow::{BuildStep, StepOutcome};

use crate::deferred::{resolve_args, CommandArg};

/// Executors a script may bind its steps to
#[derive(Debug, Clone)]
pub struct ExecutorBindings {
    local: SharedExecutor,
    container: Option<SharedExecutor>,
    default_kind: ExecutorKind,
}

impl ExecutorBindings {
    /// Host execution only
    #[must_use]
    pub fn local(executor: SharedExecutor) -> Self {
        Self {
            local: executor,
            container: None,
            default_kind: ExecutorKind::Local,
        }
    }

    /// Attach a container executor and make it the default
    #[must_use]
    pub fn with_container(mut self, executor: SharedExecutor) -> Self {
        self.container = Some(executor);
        self.default_kind = ExecutorKind::Container;
        self
    }

    /// Both kinds bound to an executor that refuses to run anything
    #[must_use]
    pub fn detached() -> Self {
        let detached: SharedExecutor = Arc::new(DetachedExecutor);
        Self::local(Arc::clone(&detached)).with_container(detached)
    }

    #[must_use]
    pub fn default_kind(&self) -> ExecutorKind {
        self.default_kind
    }

    /// Executor for `kind`
    ///
    /// # Errors
    ///
    /// Returns `ContainerUnavailable` when no container is attached.
    pub fn get(&self, kind: ExecutorKind) -> Result<SharedExecutor, ScriptError> {
        match kind {
            ExecutorKind::Local => Ok(Arc::clone(&self.local)),
            ExecutorKind::Container => self
                .container
                .as_ref()
                .map(Arc::clone)
                .ok_or(ScriptError::ContainerUnavailable),
        }
    }
}

/// A command step as requested by a DSL call
#[derive(Debug)]
pub(crate) struct CommandRequest {
    pub name: String,
    pub context: Option<String>,
    pub program: String,
    pub args: Vec<CommandArg>,
    pub cwd: Option<String>,
    pub env: IndexMap<String, String>,
    pub timeout_ms: Option<i64>,
    pub quiet: bool,
    pub capture: Option<Deferred>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<CommandArg>) -> Self {
        Self {
            name: name.into(),
            context: None,
            program: program.into(),
            args,
            cwd: None,
            env: IndexMap::new(),
            timeout_ms: None,
            quiet: false,
            capture: None,
        }
    }
}

/// Everything a command step needs when the runner reaches it
#[derive(Debug)]
struct CommandInvocation {
    executor: SharedExecutor,
    program: String,
    args: Vec<CommandArg>,
    options: CommandOptions,
    capture: Option<Deferred>,
}

impl CommandInvocation {
    async fn run(self: Arc<Self>) -> StepOutcome {
        let args = match resolve_args(&self.args) {
            Ok(args) => args,
            Err(err) => return StepOutcome::Faulted(err.into()),
        };
        let result = self.executor.execute(&self.program, &args, &self.options).await;

        match (&self.capture, result) {
            (Some(cell), Ok(result)) if result.success => {
                match cell.resolve(result.trimmed_output().to_string()) {
                    Ok(()) => StepOutcome::Succeeded,
                    Err(err) => StepOutcome::Faulted(err.into()),
                }
            }
            (_, result) => StepOutcome::from_command(result),
        }
    }
}

#[derive(Debug)]
struct Registration {
    executor: ExecutorKind,
    env: IndexMap<String, String>,
    steps: Vec<BuildStep>,
}

/// The `ctx` argument of `build(ctx)`
///
/// Exposes `ROOT`, `NAME` and `EXECUTOR` to scripts and collects the steps
/// registered through DSL calls. Configuration calls (`use_executor`,
/// `set_env`) only affect steps registered after them.
#[derive(Debug, Clone, ProvidesStaticType, NoSerialize, Allocative)]
pub struct BuildContext {
    root: String,
    name: String,
    #[allocative(skip)]
    bindings: ExecutorBindings,
    #[allocative(skip)]
    default_timeout: Option<Duration>,
    #[allocative(skip)]
    registration: Arc<Mutex<Registration>>,
}

impl BuildContext {
    #[must_use]
    pub fn new(
        root: impl Into<String>,
        name: impl Into<String>,
        bindings: ExecutorBindings,
        default_timeout: Option<Duration>,
    ) -> Self {
        let executor = bindings.default_kind();
        Self {
            root: root.into(),
            name: name.into(),
            bindings,
            default_timeout,
            registration: Arc::new(Mutex::new(Registration {
                executor,
                env: IndexMap::new(),
                steps: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn executor_kind(&self) -> ExecutorKind {
        self.lock().executor
    }

    /// Bind later steps to another executor
    ///
    /// # Errors
    ///
    /// Returns `ContainerUnavailable` when switching to a container that
    /// this run does not have.
    pub fn use_executor(&self, kind: ExecutorKind) -> Result<(), ScriptError> {
        self.bindings.get(kind)?;
        self.lock().executor = kind;
        Ok(())
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().env.insert(key.into(), value.into());
    }

    pub fn add_log(&self, level: LogLevel, message: impl Into<String>) {
        self.lock().steps.push(BuildStep::log(level, message));
    }

    /// Register a command step bound to the current executor
    pub(crate) fn add_command(&self, request: CommandRequest) -> Result<(), ScriptError> {
        let mut registration = self.lock();
        let executor = self.bindings.get(registration.executor)?;

        let mut options = CommandOptions::new()
            .with_envs(registration.env.clone())
            .with_envs(request.env)
            .with_timeout(self.default_timeout)
            .quiet(request.quiet);
        if let Some(cwd) = request.cwd {
            options = options.with_working_dir(cwd);
        }
        if let Some(ms) = request.timeout_ms {
            options = options.with_timeout_ms(ms);
        }

        let invocation = Arc::new(CommandInvocation {
            executor,
            program: request.program,
            args: request.args,
            options,
            capture: request.capture,
        });
        registration.steps.push(BuildStep::action(
            request.name,
            request.context,
            move || Arc::clone(&invocation).run(),
        ));
        Ok(())
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.lock().steps.len()
    }

    /// Move the registered steps out
    pub fn take_steps(&self) -> Vec<BuildStep> {
        std::mem::take(&mut self.lock().steps)
    }
}

impl Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BuildContext(root={}, name={}, executor={})",
            self.root,
            self.name,
            self.executor_kind()
        )
    }
}

#[starlark_value(type = "BuildContext")]
impl<'v> StarlarkValue<'v> for BuildContext {
    fn has_attr(&self, attribute: &str, _heap: &'v Heap) -> bool {
        matches!(attribute, "ROOT" | "NAME" | "EXECUTOR")
    }

    fn get_attr(&self, attribute: &str, heap: &'v Heap) -> Option<Value<'v>> {
        match attribute {
            "ROOT" => Some(heap.alloc(self.root.as_str())),
            "NAME" => Some(heap.alloc(self.name.as_str())),
            "EXECUTOR" => Some(heap.alloc(self.executor_kind().to_string())),
            _ => None,
        }
    }

    fn dir_attr(&self) -> Vec<String> {
        vec!["ROOT".into(), "NAME".into(), "EXECUTOR".into()]
    }
}

impl<'v> AllocValue<'v> for BuildContext {
    fn alloc_value(self, heap: &'v Heap) -> Value<'v> {
        heap.alloc_simple(self)
    }
}
