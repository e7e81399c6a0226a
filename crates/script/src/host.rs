//! Compiling build scripts and running their registration pass

use serde::Serialize;
use starlark::environment::{FrozenModule, Globals, GlobalsBuilder, Module};
use starlark::eval::Evaluator;
use starlark::syntax::{AstModule, Dialect};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use stevedore_errors::{Diagnostic, Error, ScriptError};
use stevedore_types::ProjectDir;
use stevedore_workflow::StepRegistry;

use crate::context::{BuildContext, ExecutorBindings};
use crate::metadata::{parse_metadata, ScriptMetadata};
use crate::{dsl, operations};

const BUILD_FUNCTION: &str = "build";
const METADATA_FUNCTION: &str = "metadata";

/// Script text plus the name used in diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub path: String,
    pub content: String,
}

impl ScriptSource {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Read a script file
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Read` if the file cannot be read.
    pub async fn read(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ScriptError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(path.display().to_string(), content))
    }
}

/// Settings shared by every script a host loads
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub project: ProjectDir,
    /// Timeout for steps that do not set their own
    pub default_timeout: Option<Duration>,
}

impl ScriptOptions {
    #[must_use]
    pub fn new(project: ProjectDir) -> Self {
        Self {
            project,
            default_timeout: None,
        }
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// A script that parsed, evaluated its top level and defines `build`
pub struct CompiledScript {
    path: String,
    module: FrozenModule,
    metadata: ScriptMetadata,
}

impl CompiledScript {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn metadata(&self) -> &ScriptMetadata {
        &self.metadata
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Result of a registration pass that filled a caller's registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedScript {
    pub workflow_name: String,
    pub metadata: ScriptMetadata,
    pub step_count: usize,
}

/// One registered step as reported by a dry pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub context: Option<String>,
    /// Message of a log-only step
    pub message: Option<String>,
}

/// Result of a dry pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptSummary {
    pub workflow_name: String,
    pub metadata: ScriptMetadata,
    pub steps: Vec<StepSummary>,
}

/// Globals visible to build scripts: the standard library and the DSL
#[must_use]
pub fn globals() -> Globals {
    GlobalsBuilder::standard()
        .with(dsl::register_globals)
        .with(operations::register_globals)
        .build()
}

fn dialect() -> Dialect {
    Dialect {
        enable_load: false,
        ..Dialect::Standard
    }
}

fn diagnostic(err: &starlark::Error) -> Diagnostic {
    let diagnostic = Diagnostic::new(err.to_string());
    match err.span() {
        Some(span) => {
            let pos = span.resolve_span().begin;
            diagnostic.at(pos.line + 1, pos.column + 1)
        }
        None => diagnostic,
    }
}

fn compile_error(path: &str, diagnostics: Vec<Diagnostic>) -> Error {
    ScriptError::Compile {
        path: path.to_string(),
        diagnostics,
    }
    .into()
}

/// Loads build scripts against a closed set of globals
pub struct ScriptHost {
    globals: Globals,
    options: ScriptOptions,
}

impl fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHost")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ScriptHost {
    #[must_use]
    pub fn new(options: ScriptOptions) -> Self {
        Self {
            globals: globals(),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    /// Parse the script, evaluate its top level and check for `build`
    ///
    /// Nothing is registered and nothing runs.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Compile` for syntax errors, undefined names,
    /// top-level failures or a missing `build` function, and
    /// `ScriptError::Metadata` if `metadata()` is present but invalid.
    pub fn compile(&self, source: &ScriptSource) -> Result<CompiledScript, Error> {
        let path = source.path.as_str();
        let ast = AstModule::parse(path, source.content.clone(), &dialect())
            .map_err(|e| compile_error(path, vec![diagnostic(&e)]))?;

        let module = Module::new();
        {
            let mut eval = Evaluator::new(&module);
            eval.eval_module(ast, &self.globals)
                .map_err(|e| compile_error(path, vec![diagnostic(&e)]))?;
        }

        match module.get(BUILD_FUNCTION) {
            Some(value) if value.get_type() == "function" => {}
            Some(value) => {
                return Err(compile_error(
                    path,
                    vec![Diagnostic::new(format!(
                        "'build' must be a function taking ctx, got {}",
                        value.get_type()
                    ))],
                ))
            }
            None => {
                return Err(compile_error(
                    path,
                    vec![Diagnostic::new("script must define a build(ctx) function")],
                ))
            }
        }
        let has_metadata = module.get(METADATA_FUNCTION).is_some();

        let module = module
            .freeze()
            .map_err(|e| compile_error(path, vec![Diagnostic::new(anyhow::Error::from(e).to_string())]))?;

        let metadata = if has_metadata {
            Self::evaluate_metadata(path, &module)?
        } else {
            ScriptMetadata::default()
        };

        tracing::debug!(script = path, "compiled build script");
        Ok(CompiledScript {
            path: path.to_string(),
            module,
            metadata,
        })
    }

    fn evaluate_metadata(path: &str, frozen: &FrozenModule) -> Result<ScriptMetadata, Error> {
        let metadata_error = |message: String| ScriptError::Metadata {
            path: path.to_string(),
            message,
        };

        let function = frozen
            .get(METADATA_FUNCTION)
            .map_err(|e| metadata_error(e.to_string()))?;
        let module = Module::new();
        let mut eval = Evaluator::new(&module);
        let function = function.owned_value(module.frozen_heap());
        let value = eval
            .eval_function(function, &[], &[])
            .map_err(|e| metadata_error(e.to_string()))?;
        Ok(parse_metadata(path, value)?)
    }

    /// Call `build(ctx)` and append the steps it registers to `registry`
    ///
    /// Returns the number of steps registered. On error the registry is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Registration` if any DSL call or script code
    /// fails during the pass.
    pub fn register(
        &self,
        compiled: &CompiledScript,
        bindings: ExecutorBindings,
        registry: &mut StepRegistry,
    ) -> Result<usize, Error> {
        let registration_error = |message: String| ScriptError::Registration {
            path: compiled.path.clone(),
            message,
        };

        let build = compiled
            .module
            .get(BUILD_FUNCTION)
            .map_err(|e| registration_error(e.to_string()))?;
        let context = BuildContext::new(
            self.options.project.path().display().to_string(),
            self.workflow_name(compiled),
            bindings,
            self.options.default_timeout,
        );

        let module = Module::new();
        {
            let mut eval = Evaluator::new(&module);
            let build = build.owned_value(module.frozen_heap());
            let ctx = module.heap().alloc(context.clone());
            eval.eval_function(build, &[ctx], &[])
                .map_err(|e| registration_error(e.to_string()))?;
        }

        let steps = context.take_steps();
        let count = steps.len();
        for step in steps {
            registry.register(step);
        }
        tracing::debug!(script = %compiled.path, steps = count, "registered build steps");
        Ok(count)
    }

    /// Declared workflow name, else the project directory name
    #[must_use]
    pub fn workflow_name(&self, compiled: &CompiledScript) -> String {
        compiled
            .metadata
            .workflow_name(&self.options.project.display_name())
    }

    /// Compile and register into `registry`, which is cleared first
    ///
    /// # Errors
    ///
    /// Returns the compile or registration error; the registry is then
    /// empty and no step has run.
    pub fn load_and_run(
        &self,
        source: &ScriptSource,
        bindings: ExecutorBindings,
        registry: &mut StepRegistry,
    ) -> Result<LoadedScript, Error> {
        registry.clear();
        let compiled = self.compile(source)?;
        let step_count = self.register(&compiled, bindings, registry)?;

        Ok(LoadedScript {
            workflow_name: self.workflow_name(&compiled),
            metadata: compiled.metadata,
            step_count,
        })
    }

    /// Compile and register into a scratch registry bound to a detached
    /// executor, returning the step list
    ///
    /// # Errors
    ///
    /// Returns the compile or registration error.
    pub fn load_and_verify(&self, source: &ScriptSource) -> Result<ScriptSummary, Error> {
        let mut scratch = StepRegistry::new();
        let compiled = self.compile(source)?;
        self.register(&compiled, ExecutorBindings::detached(), &mut scratch)?;

        let steps = scratch
            .steps()
            .iter()
            .map(|step| StepSummary {
                name: step.name().to_string(),
                context: step.context().map(str::to_string),
                message: step.log_message().map(str::to_string),
            })
            .collect();

        Ok(ScriptSummary {
            workflow_name: self.workflow_name(&compiled),
            metadata: compiled.metadata,
            steps,
        })
    }
}
