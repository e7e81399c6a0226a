//! Thin wrappers for common toolchains
//!
//! Each wrapper registers one command step named `<Tool>.<Verb>` so failed
//! steps can be matched to a tool-availability checker.

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::none::NoneType;
use starlark::values::Value;

use crate::context::CommandRequest;
use crate::deferred::{unpack_args, CommandArg};
use crate::dsl::build_context;

/// `Dotnet` + `build` -> `Dotnet.Build`
#[must_use]
pub fn step_name(tool: &str, verb: &str) -> String {
    let mut chars = verb.chars();
    let verb = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{tool}.{verb}")
}

/// Register the toolchain wrappers as globals
pub fn register_globals(builder: &mut GlobalsBuilder) {
    operations_module(builder);
}

#[starlark_module]
#[allow(clippy::unnecessary_wraps)]
fn operations_module(builder: &mut GlobalsBuilder) {
    /// Run a dotnet CLI verb
    ///
    /// Examples:
    /// - dotnet(ctx, "restore")
    /// - dotnet(ctx, "build", "src/App/App.csproj", ["-c", "Release"])
    fn dotnet<'v>(
        ctx: Value<'v>,
        verb: &str,
        project: Option<&str>,
        args: Option<Value<'v>>,
    ) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;

        let mut argv = vec![CommandArg::from(verb)];
        if let Some(project) = project {
            argv.push(CommandArg::from(project));
        }
        argv.extend(unpack_args(args)?);

        let mut request = CommandRequest::new(step_name("Dotnet", verb), "dotnet", argv);
        request.context = project.map(str::to_string);
        build_ctx.add_command(request)?;
        Ok(NoneType)
    }

    /// Run a cargo subcommand
    ///
    /// Example:
    /// - cargo(ctx, "test", ["--workspace"])
    fn cargo<'v>(ctx: Value<'v>, verb: &str, args: Option<Value<'v>>) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;

        let mut argv = vec![CommandArg::from(verb)];
        argv.extend(unpack_args(args)?);

        build_ctx.add_command(CommandRequest::new(step_name("Cargo", verb), "cargo", argv))?;
        Ok(NoneType)
    }

    /// Run an npm command
    ///
    /// Examples:
    /// - npm(ctx, "ci")
    /// - npm(ctx, "run", ["build"])
    fn npm<'v>(ctx: Value<'v>, verb: &str, args: Option<Value<'v>>) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;

        let mut argv = vec![CommandArg::from(verb)];
        argv.extend(unpack_args(args)?);

        build_ctx.add_command(CommandRequest::new(step_name("Npm", verb), "npm", argv))?;
        Ok(NoneType)
    }

    /// Build a container image from the project root
    ///
    /// Example:
    /// - docker_build(ctx, "myapp:latest", dockerfile = "deploy/Dockerfile")
    fn docker_build<'v>(
        ctx: Value<'v>,
        tag: Value<'v>,
        dockerfile: Option<&str>,
    ) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;

        let mut argv = vec![
            CommandArg::from("build"),
            CommandArg::from("-t"),
            CommandArg::from_value(tag)?,
        ];
        if let Some(dockerfile) = dockerfile {
            argv.push(CommandArg::from("-f"));
            argv.push(CommandArg::from(dockerfile));
        }
        argv.push(CommandArg::from("."));

        build_ctx.add_command(CommandRequest::new("Docker.Build", "docker", argv))?;
        Ok(NoneType)
    }

    /// Run the AWS CLI
    ///
    /// Example:
    /// - aws(ctx, ["s3", "sync", "dist/", "s3://bucket/site"])
    fn aws<'v>(ctx: Value<'v>, args: Value<'v>) -> anyhow::Result<NoneType> {
        let build_ctx = build_context(ctx)?;
        let argv = unpack_args(Some(args))?;
        if argv.is_empty() {
            return Err(anyhow::anyhow!("aws() needs at least one argument"));
        }

        build_ctx.add_command(CommandRequest::new("Aws.Cli", "aws", argv))?;
        Ok(NoneType)
    }
}
