// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetdag`.
///
/// The build profile is not a flag: it comes from the environment variable
/// named by `[config].profile_env` (`NODE_ENV` by default).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build front-end assets from a task graph and rebuild on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If the default file is missing, the built-in pipeline is used.
    #[arg(long, value_name = "PATH", default_value = "Assetdag.toml")]
    pub config: String,

    /// Build once and exit; do not watch.
    #[arg(long)]
    pub once: bool,

    /// Remove the build root before the initial build.
    #[arg(long)]
    pub clean: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print the profile, tasks and execution waves,
    /// but build nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
