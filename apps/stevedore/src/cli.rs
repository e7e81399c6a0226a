//! Command line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// stevedore - scripted builds in reusable containers
#[derive(Parser)]
#[command(name = "stevedore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run Starlark build scripts in a reusable container or on the host")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Print the result as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Color output control
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = "STEVEDORE_PROJECT")]
    pub project: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Compile a build script and run its steps
    Run {
        /// Build script (defaults to general.script, usually build.star)
        script: Option<PathBuf>,

        /// Run every step on the host instead of in a container
        #[arg(long)]
        local: bool,

        /// Replace any warm container with a fresh one
        #[arg(long)]
        cold: bool,

        /// Keep the container after the run even if warm reuse is off
        #[arg(long)]
        keep: bool,
    },

    /// Compile a build script and list its steps without running them
    Verify {
        /// Build script (defaults to general.script, usually build.star)
        script: Option<PathBuf>,
    },

    /// Remove the project's warm container
    Clean,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}
