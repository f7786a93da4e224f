// src/exec/process.rs

//! Real process handle backed by `tokio::process`.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::OutputStream;

use super::backend::{OutputSink, ProcessFactory, ProcessHandle, ProcessOutcome};
use super::pump::spawn_pump;

/// A child process whose stdout/stderr are piped into output sinks.
///
/// The child is killed if the handle is dropped before it exits.
#[derive(Debug, Default)]
pub struct TokioProcess {
    child: Option<Child>,
    pumps: Vec<JoinHandle<()>>,
    command: String,
}

impl TokioProcess {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessHandle for TokioProcess {
    fn start(
        &mut self,
        command: &str,
        args: &[String],
        stdout: Arc<dyn OutputSink>,
        stderr: Arc<dyn OutputSink>,
    ) -> Result<()> {
        if self.child.is_some() {
            bail!("process for '{}' was already started", self.command);
        }

        info!(cmd = %command, ?args, "starting test process");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process '{}'", command))?;

        if let Some(out) = child.stdout.take() {
            self.pumps.push(spawn_pump(out, stdout, OutputStream::Stdout));
        }
        if let Some(err) = child.stderr.take() {
            self.pumps.push(spawn_pump(err, stderr, OutputStream::Stderr));
        }

        debug!(cmd = %command, pid = ?child.id(), "test process started");
        self.command = command.to_string();
        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + '_>> {
        Box::pin(async move {
            let child = self
                .child
                .as_mut()
                .ok_or_else(|| anyhow!("cannot wait for a process that was never started"))?;

            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for process '{}'", self.command))?;

            // The exit status can arrive before the pipes are drained; hold the
            // result back until every byte has reached the sinks.
            for pump in self.pumps.drain(..) {
                if let Err(e) = pump.await {
                    warn!(cmd = %self.command, error = %e, "output pump task failed");
                }
            }

            let outcome = ProcessOutcome::from_code(status.code(), status.success());
            info!(
                cmd = %self.command,
                exit_code = status.code().unwrap_or(-1),
                success = status.success(),
                "test process exited"
            );
            Ok(outcome)
        })
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let Some(child) = self.child.as_mut() else {
                return Ok(());
            };

            child
                .kill()
                .await
                .with_context(|| format!("killing process '{}'", self.command))?;

            // Grandchildren can keep the pipes open long after the child is gone.
            for pump in self.pumps.drain(..) {
                pump.abort();
            }

            info!(cmd = %self.command, "test process killed");
            Ok(())
        })
    }
}

/// Factory for [`TokioProcess`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessFactory;

impl ProcessFactory for TokioProcessFactory {
    fn new_process(&self) -> Box<dyn ProcessHandle> {
        Box::new(TokioProcess::new())
    }
}
