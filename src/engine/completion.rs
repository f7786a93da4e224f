// src/engine/completion.rs

//! Background completion watcher.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, warn};

use crate::exec::{ProcessHandle, ProcessOutcome};
use crate::monitor::OutputMonitor;
use crate::status::{StatusReader, TestStructure};

/// Sent exactly once, when the test process has exited.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    /// How the process ended, or why waiting for it failed.
    pub outcome: Result<ProcessOutcome, String>,

    /// Status artifact read right after exit, if it could be read.
    pub final_status: Option<TestStructure>,
}

/// How the watcher stopped waiting.
enum Exit {
    Exited(anyhow::Result<ProcessOutcome>),
    Abandoned,
}

/// Spawn the task that owns `process` until it exits.
///
/// On exit, whether successful or not, it makes one attempt to read the
/// final status, sends a [`CompletionReport`] and then closes the channel
/// by dropping the sender, so every later check sees the run as complete.
/// `wake` lets a caller's poll loop cut its sleep short.
///
/// When `cancel` fires, or its sender is dropped, before the process has
/// exited, the process is killed and reaped and the report carries an error.
pub(crate) fn spawn_completion_watcher(
    mut process: Box<dyn ProcessHandle>,
    monitor: Arc<OutputMonitor>,
    reader: StatusReader,
    done_tx: mpsc::Sender<CompletionReport>,
    mut cancel: oneshot::Receiver<()>,
    wake: Option<Arc<Notify>>,
) {
    tokio::spawn(async move {
        debug!("waiting for the test process to complete");

        let exit = tokio::select! {
            res = process.wait() => Exit::Exited(res),
            _ = &mut cancel => Exit::Abandoned,
        };

        let outcome = match exit {
            Exit::Exited(Ok(outcome)) => {
                if outcome.is_success() {
                    info!(%outcome, "test process has completed; detected by the completion watcher");
                } else {
                    warn!(%outcome, "test process has completed unsuccessfully");
                }
                Ok(outcome)
            }
            Exit::Exited(Err(e)) => {
                warn!(error = %e, "failed to wait for the test process to complete");
                Err(format!("{e:#}"))
            }
            Exit::Abandoned => {
                warn!("run abandoned while the test process was still running; killing it");
                if let Err(e) = process.kill().await {
                    warn!(error = %e, "failed to kill the test process");
                }
                Err("test process killed after its run was abandoned".to_string())
            }
        };

        let final_status = read_final_status(&monitor, &reader);
        let run_id = monitor.run_id();

        if done_tx
            .send(CompletionReport {
                outcome,
                final_status,
            })
            .await
            .is_err()
        {
            debug!("run was dropped before its completion was observed");
        }
        drop(done_tx);

        if let Some(wake) = wake {
            wake.notify_one();
        }

        info!(run_id = run_id.as_deref().unwrap_or("-"), "test run completed");
    });
}

fn read_final_status(monitor: &OutputMonitor, reader: &StatusReader) -> Option<TestStructure> {
    let Some((ras_location, run_id)) = monitor.coordinates() else {
        info!("not enough information to find the status artifact; the process never announced it");
        return None;
    };

    match reader.read(&ras_location, &run_id) {
        Ok(status) => {
            debug!(run_id = %run_id, status = status.status(), "read final test status");
            Some(status)
        }
        Err(e) => {
            warn!(run_id = %run_id, error = %e, "could not read the final test status");
            None
        }
    }
}
