//! Core DSL functions: commands, captures, logging and configuration
//!
//! Every function returns immediately. Command functions append exactly one
//! step; configuration functions append none.

use indexmap::IndexMap;
use starlark::environment::GlobalsBuilder;
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::values::dict::DictRef;
use starlark::values::none::NoneType;
use starlark::values::{Value, ValueLike};
use std::str::FromStr;
use stevedore_types::{Deferred, ExecutorKind, LogLevel};

use crate::context::{BuildContext, CommandRequest};
use crate::deferred::{unpack_args, DeferredRef};

/// Step name for `shell`
pub const SHELL_STEP: &str = "Shell.Run";
/// Step name for `capture`
pub const CAPTURE_STEP: &str = "Shell.Capture";

pub(crate) fn build_context<'v>(ctx: Value<'v>) -> anyhow::Result<&'v BuildContext> {
    ctx.downcast_ref::<BuildContext>()
        .ok_or_else(|| anyhow::anyhow!("first argument must be the build context, got {}", ctx.get_type()))
}

/// Unpack an optional `env` dict of string keys and values
pub(crate) fn unpack_env(value: Option<Value<'_>>) -> anyhow::Result<IndexMap<String, String>> {
    let Some(value) = value.filter(|v| !v.is_none()) else {
        return Ok(IndexMap::new());
    };
    let dict = DictRef::from_value(value)
        .ok_or_else(|| anyhow::anyhow!("env must be a dict, got {}", value.get_type()))?;

    let mut env = IndexMap::new();
    for (key, val) in dict.iter() {
        let key = key
            .unpack_str()
            .ok_or_else(|| anyhow::anyhow!("env keys must be strings, got {}", key.get_type()))?;
        let val = val
            .unpack_str()
            .ok_or_else(|| anyhow::anyhow!("env value for '{key}' must be a string, got {}", val.get_type()))?;
        env.insert(key.to_string(), val.to_string());
    }
    Ok(env)
}

/// Register the core DSL functions as globals
pub fn register_globals(builder: &mut GlobalsBuilder) {
    dsl_module(builder);
}

#[starlark_module]
#[allow(clippy::too_many_arguments, clippy::unnecessary_wraps)]
fn dsl_module(builder: &mut GlobalsBuilder) {
    /// Run a program
    ///
    /// Examples:
    /// - shell(ctx, "make")
    /// - shell(ctx, "dotnet", ["test", "--no-build"], cwd = "tests", timeout_ms = 600000)
    /// - shell(ctx, "./deploy.sh", env = {"STAGE": "prod"}, label = "deploy")
    fn shell<'v>(
        ctx: Value<'v>,
        program: &str,
        args: Option<Value<'v>>,
        cwd: Option<&str>,
        env: Option<Value<'v>>,
        timeout_ms: Option<i32>,
        name: Option<&str>,
        label: Option<&str>,
        quiet: Option<bool>,
    ) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;

        let mut request = CommandRequest::new(name.unwrap_or(SHELL_STEP), program, unpack_args(args)?);
        request.context = label.map(str::to_string);
        request.cwd = cwd.map(str::to_string);
        request.env = unpack_env(env)?;
        request.timeout_ms = timeout_ms.map(i64::from);
        request.quiet = quiet.unwrap_or(false);

        build_ctx.add_command(request)?;
        Ok(NoneType)
    }

    /// Run a program and capture its trimmed stdout for later steps
    ///
    /// The returned value can be passed as an argument to any later step.
    ///
    /// Example:
    /// - sha = capture(ctx, "git", ["rev-parse", "HEAD"])
    /// - docker_build(ctx, "app")
    /// - shell(ctx, "docker", ["tag", "app", sha])
    fn capture<'v>(
        ctx: Value<'v>,
        program: &str,
        args: Option<Value<'v>>,
        cwd: Option<&str>,
        env: Option<Value<'v>>,
        name: Option<&str>,
        eval: &mut Evaluator<'v, '_, '_>,
    ) -> anyhow::Result<Value<'v>> {
        let build_ctx = build_context(ctx)?;
        let step_name = name.unwrap_or(CAPTURE_STEP);
        let cell = Deferred::new(step_name);

        let mut request = CommandRequest::new(step_name, program, unpack_args(args)?);
        request.cwd = cwd.map(str::to_string);
        request.env = unpack_env(env)?;
        request.quiet = true;
        request.capture = Some(cell.clone());

        build_ctx.add_command(request)?;
        Ok(eval.heap().alloc(DeferredRef::new(cell)))
    }

    /// Emit a message when the run reaches this point
    ///
    /// Levels: "debug", "info", "warning", "error".
    fn log<'v>(ctx: Value<'v>, message: &str, level: Option<&str>) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;
        let level = LogLevel::from_str(level.unwrap_or("info"))?;
        build_ctx.add_log(level, message);
        Ok(NoneType)
    }

    /// Run later steps on "local" or "container"
    fn use_executor<'v>(ctx: Value<'v>, kind: &str) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;
        build_ctx.use_executor(ExecutorKind::from_str(kind)?)?;
        Ok(NoneType)
    }

    /// Set an environment variable for every later step
    fn set_env<'v>(ctx: Value<'v>, key: &str, value: &str) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;
        if key.is_empty() {
            return Err(anyhow::anyhow!("environment variable name cannot be empty"));
        }
        build_ctx.set_env(key, value);
        Ok(NoneType)
    }
}
