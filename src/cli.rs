// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `localrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "localrun",
    version,
    about = "Launch a test process locally and follow it until its run is finished.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Localrun.toml` in the current working directory. A missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Localrun.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOCALRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load + validate config, print what would be launched, but don't
    /// launch anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command line of the test process. Overrides `[launch]` in the config.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl CliArgs {
    /// Split the trailing command line into program and arguments.
    pub fn command_override(&self) -> Option<(String, Vec<String>)> {
        let (program, args) = self.command.split_first()?;
        Some((program.clone(), args.to_vec()))
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
