// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod monitor;
pub mod status;
pub mod types;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::config::model::ConfigFile;
use crate::engine::{poll_until_complete, LocalRun};
use crate::exec::TokioProcessFactory;
use crate::fs::RealFileSystem;
use crate::status::TestStructure;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus the command line from the CLI, if any)
/// - a `LocalRun` backed by a real process and the real filesystem
/// - the poll loop that waits for the run to finish
/// - Ctrl-C handling
///
/// Returns `Ok(true)` only when the run finished and its result is passed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let mut cfg = load_or_default(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    if let Some((command, command_args)) = args.command_override() {
        cfg = cfg.with_command(command, command_args);
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(true);
    }

    let Some(command) = cfg.launch().command.clone() else {
        bail!("no command to launch: pass one after `--` or set [launch].command");
    };
    let command_args = cfg.launch().args.clone();

    let wake = Arc::new(Notify::new());
    let mut local_run = LocalRun::new(
        Arc::new(TokioProcessFactory),
        Arc::new(RealFileSystem),
        cfg.run_options(),
    )
    .with_wake(Arc::clone(&wake));

    let drive = async {
        local_run.launch(&command, &command_args).await?;
        info!(
            run_id = local_run.run_id().as_deref().unwrap_or("-"),
            "waiting for the run to finish"
        );
        let status = poll_until_complete(&mut local_run, cfg.status().poll_interval, &wake).await?;
        Ok::<_, crate::errors::LocalRunError>(status)
    };

    let status = tokio::select! {
        res = drive => res?,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            warn!("interrupted; abandoning the run");
            return Ok(false);
        }
    };

    if let Some(outcome) = local_run.exit_outcome() {
        debug!(?outcome, "test process exit");
    }

    match status {
        Some(status) => {
            print_summary(&status);
            Ok(status.is_finished() && status.is_passed())
        }
        None => {
            println!("run finished but no status could be read");
            Ok(false)
        }
    }
}

fn print_summary(status: &TestStructure) {
    println!(
        "run {} ({}): {} / {}",
        status.run_name.as_deref().unwrap_or("-"),
        status.test_short_name.as_deref().or(status.test_name.as_deref()).unwrap_or("-"),
        status.status(),
        status.result()
    );
    for method in &status.methods {
        println!(
            "  - {}: {}",
            method.method_name(),
            method.result.as_deref().unwrap_or("-")
        );
    }
}

/// Print what would be launched and how it would be followed.
fn print_dry_run(cfg: &ConfigFile) {
    println!("localrun dry-run");
    match &cfg.launch().command {
        Some(command) => {
            println!("  command: {command}");
            if !cfg.launch().args.is_empty() {
                println!("  args: {:?}", cfg.launch().args);
            }
        }
        None => println!("  command: (none)"),
    }
    println!();

    let discovery = cfg.discovery();
    println!("discovery:");
    println!("  tick = {:?}", discovery.tick);
    match discovery.timeout {
        Some(timeout) => println!("  timeout = {timeout:?}"),
        None => println!("  timeout = (until the process exits)"),
    }
    println!("  notification_capacity = {}", discovery.notification_capacity);

    let status = cfg.status();
    println!("status:");
    println!("  artifact_file_name = {}", status.locator.file_name);
    println!("  scheme_prefix = {}", status.locator.scheme_prefix);
    println!("  poll_interval = {:?}", status.poll_interval);
    println!("  filesystem_fallback = {}", status.filesystem_fallback);

    debug!("dry-run complete (nothing launched)");
}
