// src/engine/poll.rs

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;

use crate::errors::Result;
use crate::status::TestStructure;

use super::LocalRun;

/// Poll `run` every `interval` until it is complete, then return the last
/// status that could be read.
///
/// `wake` is the same `Notify` handed to [`LocalRun::with_wake`]; it cuts a
/// sleep short as soon as the process exits.
pub async fn poll_until_complete(
    run: &mut LocalRun,
    interval: Duration,
    wake: &Notify,
) -> Result<Option<TestStructure>> {
    while !run.is_complete() {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = wake.notified() => {
                debug!("woken early; the test process has exited");
            }
        }
    }

    match run.current_status() {
        Ok(status) => Ok(Some(status)),
        Err(e) if e.is_soft() => {
            debug!(reason = %e, "no fresh status after completion; using the last one read");
            Ok(run.latest_status().cloned())
        }
        Err(e) => Err(e),
    }
}
