#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::needless_lifetimes)]

//! Starlark build scripts for stevedore
//!
//! A build script defines `build(ctx)`. Loading a script compiles it against
//! a closed set of globals (the Starlark standard library plus the DSL in
//! [`dsl`] and [`operations`]), then calls `build` once. DSL calls only
//! register steps; nothing runs until the workflow runner awaits them.
//!
//! ```text
//! def metadata():
//!     return {"name": "api", "description": "Build and test the API"}
//!
//! def build(ctx):
//!     dotnet(ctx, "restore")
//!     dotnet(ctx, "build", args = ["-c", "Release"])
//!     sha = capture(ctx, "git", ["rev-parse", "--short", "HEAD"])
//!     docker_build(ctx, sha)
//! ```

#[allow(unsafe_code)] // ProvidesStaticType derive emits `unsafe impl`
pub mod context;
#[allow(unsafe_code)] // ProvidesStaticType derive emits `unsafe impl`
pub mod deferred;
pub mod dsl;
pub mod host;
pub mod metadata;
pub mod operations;

pub use context::{BuildContext, ExecutorBindings};
pub use deferred::{CommandArg, DeferredRef};
pub use host::{
    globals, CompiledScript, LoadedScript, ScriptHost, ScriptOptions, ScriptSource, ScriptSummary,
    StepSummary,
};
pub use metadata::ScriptMetadata;
