// src/exec/backend.rs

//! Pluggable process abstraction.
//!
//! The orchestrator talks to a [`ProcessHandle`] obtained from a
//! [`ProcessFactory`] instead of `tokio::process` directly. Production code
//! uses [`super::TokioProcessFactory`]; tests provide a scripted fake that
//! writes canned output into the sinks and exits on cue.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

/// Where a started process delivers its output.
///
/// `write` is invoked from the pump task every time a block of bytes becomes
/// available. Chunk boundaries are arbitrary: they need not align with lines.
/// Implementations must never block, because the caller is the task draining
/// the child's pipe.
pub trait OutputSink: Send + Sync {
    fn write(&self, chunk: &[u8]) -> io::Result<usize>;

    /// The stream reached end-of-file; no further writes follow.
    fn finish(&self) {}
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    Failed(i32),
}

impl ProcessOutcome {
    pub fn from_code(code: Option<i32>, success: bool) -> Self {
        if success {
            ProcessOutcome::Success
        } else {
            ProcessOutcome::Failed(code.unwrap_or(-1))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success)
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Success => f.write_str("exited successfully"),
            ProcessOutcome::Failed(code) => write!(f, "exited with code {code}"),
        }
    }
}

/// One OS process instance. Created once, started once, never reused.
pub trait ProcessHandle: Send {
    /// Start `command` with its stdout and stderr redirected into the given
    /// sinks. The sinks start receiving data immediately, asynchronously to
    /// the caller. Must be called from within a Tokio runtime.
    ///
    /// A failure is reported once; there is no retry here.
    fn start(
        &mut self,
        command: &str,
        args: &[String],
        stdout: Arc<dyn OutputSink>,
        stderr: Arc<dyn OutputSink>,
    ) -> Result<()>;

    /// Resolve once the process has exited and its output has been fully
    /// delivered to the sinks.
    ///
    /// The handle is typically moved into a separate task to be awaited
    /// there, so this never depends on the task that called `start`.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + '_>>;

    /// Kill the process and reap it. Used when a run is abandoned while its
    /// process is still running; a `wait` in progress must have been dropped
    /// first.
    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Creates fresh process handles.
pub trait ProcessFactory: Send + Sync {
    fn new_process(&self) -> Box<dyn ProcessHandle>;
}
