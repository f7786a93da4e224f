// src/engine/mod.rs

//! Orchestration of a single local test run.
//!
//! This module ties together:
//! - the process handle that starts the test process
//! - the output monitor that discovers the run id and result archive store
//! - a background completion watcher waiting for the process to exit
//! - status artifact reads answering "is it finished, and how did it go?"
//!
//! [`LocalRun`] owns all of the above for one run; [`poll`] holds the small
//! caller-side loop the binary uses to wait for a run to finish.

use std::fmt;
use std::time::Duration;

use crate::monitor::DEFAULT_NOTIFICATION_CAPACITY;
use crate::status::ArtifactLocator;

pub mod completion;
pub mod discovery;
pub mod local_run;
pub mod poll;

pub use completion::CompletionReport;
pub use local_run::LocalRun;
pub use poll::poll_until_complete;

/// Lifecycle of a [`LocalRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Launching,
    AwaitingRunId,
    AwaitingResultsFolder,
    /// Run id and result store are known; status can be queried.
    Monitoring,
    Terminal,
    /// The process could not be started, or ended before announcing what
    /// was needed to monitor it.
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::NotStarted => "not-started",
            RunPhase::Launching => "launching",
            RunPhase::AwaitingRunId => "awaiting-run-id",
            RunPhase::AwaitingResultsFolder => "awaiting-results-folder",
            RunPhase::Monitoring => "monitoring",
            RunPhase::Terminal => "terminal",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Options passed down to each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Longest single wait on the output monitor's notification queue.
    pub discovery_tick: Duration,

    /// Overall deadline for the launch sequence. `None` waits for as long as
    /// the process runs.
    pub discovery_timeout: Option<Duration>,

    pub notification_capacity: usize,

    pub locator: ArtifactLocator,

    /// Let completion checks re-read the status artifact when the process
    /// has not been seen exiting yet.
    pub filesystem_fallback: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            discovery_tick: Duration::from_secs(1),
            discovery_timeout: None,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            locator: ArtifactLocator::default(),
            filesystem_fallback: true,
        }
    }
}
