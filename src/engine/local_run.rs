// src/engine/local_run.rs

use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::errors::{LocalRunError, Result};
use crate::exec::{ProcessFactory, ProcessOutcome};
use crate::fs::FileSystem;
use crate::monitor::{Discovery, DiscoveryTarget, OutputMonitor};
use crate::status::{StatusReader, TestStructure};
use crate::types::OutputStream;

use super::completion::{spawn_completion_watcher, CompletionReport};
use super::discovery::DiscoveryDeadline;
use super::{RunOptions, RunPhase};

/// One test process launched on this machine, and everything known about
/// it.
///
/// The run id and result archive store are not known up front: the process
/// allocates them and traces them to its output. [`LocalRun::launch`] starts
/// the process and waits, bounded by the process's own lifetime, until both
/// have been seen. After that [`LocalRun::is_complete`] and
/// [`LocalRun::current_status`] answer questions about the run without ever
/// blocking.
///
/// The run owns its process: dropping a `LocalRun` whose process is still
/// running kills it.
pub struct LocalRun {
    factory: Arc<dyn ProcessFactory>,
    reader: StatusReader,
    options: RunOptions,

    monitor: Arc<OutputMonitor>,
    discoveries: mpsc::Receiver<Discovery>,

    phase: RunPhase,

    /// Most recent successfully read status snapshot.
    latest_status: Option<TestStructure>,

    /// Receives the completion watcher's single report. `None` until the
    /// process has been started.
    done_rx: Option<mpsc::Receiver<CompletionReport>>,
    completion_seen: bool,
    exit_outcome: Option<std::result::Result<ProcessOutcome, String>>,

    /// Tells the completion watcher to kill the process. Dropping it does
    /// the same.
    cancel_tx: Option<oneshot::Sender<()>>,

    wake: Option<Arc<Notify>>,
}

impl std::fmt::Debug for LocalRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRun")
            .field("phase", &self.phase)
            .field("run_id", &self.monitor.run_id())
            .field("ras_location", &self.monitor.ras_location())
            .field("completion_seen", &self.completion_seen)
            .finish_non_exhaustive()
    }
}

impl LocalRun {
    pub fn new(
        factory: Arc<dyn ProcessFactory>,
        fs: Arc<dyn FileSystem>,
        options: RunOptions,
    ) -> Self {
        let (monitor, discoveries) = OutputMonitor::new(options.notification_capacity);
        let reader = StatusReader::new(fs, options.locator.clone());

        Self {
            factory,
            reader,
            options,
            monitor: Arc::new(monitor),
            discoveries,
            phase: RunPhase::NotStarted,
            latest_status: None,
            done_rx: None,
            completion_seen: false,
            exit_outcome: None,
            cancel_tx: None,
            wake: None,
        }
    }

    /// Notify `wake` once the process has exited, so a polling caller can
    /// stop sleeping early.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = Some(wake);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn run_id(&self) -> Option<String> {
        self.monitor.run_id()
    }

    pub fn ras_location(&self) -> Option<String> {
        self.monitor.ras_location()
    }

    /// Cached snapshot from the most recent successful status read.
    pub fn latest_status(&self) -> Option<&TestStructure> {
        self.latest_status.as_ref()
    }

    /// How the process ended, once its exit has been observed.
    pub fn exit_outcome(&self) -> Option<&std::result::Result<ProcessOutcome, String>> {
        self.exit_outcome.as_ref()
    }

    pub fn monitor(&self) -> &Arc<OutputMonitor> {
        &self.monitor
    }

    /// Everything the process has written so far.
    pub fn output_text(&self) -> String {
        self.monitor.output_text()
    }

    /// Start the test process and wait until its run id and result archive
    /// store location have been discovered.
    ///
    /// Each wait gives up as soon as the process is seen to be complete, so
    /// this never outlives the process. With `discovery_timeout` set it also
    /// gives up at that deadline.
    pub async fn launch(&mut self, command: &str, args: &[String]) -> Result<()> {
        if self.phase != RunPhase::NotStarted {
            return Err(LocalRunError::AlreadyLaunched);
        }
        self.set_phase(RunPhase::Launching);
        let deadline = DiscoveryDeadline::start(self.options.discovery_timeout);

        let mut process = self.factory.new_process();
        let stdout = self.monitor.sink(OutputStream::Stdout);
        let stderr = self.monitor.sink(OutputStream::Stderr);

        if let Err(e) = process.start(command, args, stdout, stderr) {
            error!(cmd = %command, ?args, error = %e, "failed to start the test process");
            self.set_phase(RunPhase::Failed);
            return Err(LocalRunError::LaunchFailure {
                command: command.to_string(),
                source: e.into(),
            });
        }

        info!(cmd = %command, "test process started; spawning a task to wait for it to complete");
        let (done_tx, done_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.done_rx = Some(done_rx);
        self.cancel_tx = Some(cancel_tx);
        spawn_completion_watcher(
            process,
            Arc::clone(&self.monitor),
            self.reader.clone(),
            done_tx,
            cancel_rx,
            self.wake.clone(),
        );

        self.set_phase(RunPhase::AwaitingRunId);
        let run_id = self.discover(DiscoveryTarget::RunId, &deadline).await?;

        self.set_phase(RunPhase::AwaitingResultsFolder);
        let ras_location = self.discover(DiscoveryTarget::RasLocation, &deadline).await?;

        info!(
            run_id = %run_id,
            ras = %ras_location,
            "test process started and in progress; it can be monitored now"
        );

        if self.terminal_observed() {
            self.set_phase(RunPhase::Terminal);
        } else {
            self.set_phase(RunPhase::Monitoring);
        }
        Ok(())
    }

    /// Has the run finished?
    ///
    /// Never blocks. Checks, in order: the cached snapshot, the completion
    /// channel, and (when `filesystem_fallback` is on) a fresh read of the
    /// status artifact, since the process may flush its final status just
    /// before or just after it is seen exiting.
    pub fn is_complete(&mut self) -> bool {
        // A failed run has either exited already or had its process killed.
        if matches!(self.phase, RunPhase::Terminal | RunPhase::Failed) {
            return true;
        }
        if self.done_rx.is_none() {
            return false;
        }

        if self.latest_status.as_ref().is_some_and(TestStructure::is_finished) {
            self.reached_terminal();
            return true;
        }

        if self.poll_completion() {
            self.reached_terminal();
            return true;
        }

        if self.options.filesystem_fallback {
            match self.refresh_status() {
                Ok(status) if status.is_finished() => {
                    info!(
                        run_id = status.run_name.as_deref().unwrap_or("-"),
                        "test is complete now when it wasn't before"
                    );
                    self.reached_terminal();
                    return true;
                }
                Ok(_) => {}
                Err(e) if e.is_soft() => {
                    debug!(reason = %e, "no status artifact to check yet");
                }
                Err(e) => {
                    warn!(error = %e, "could not read the latest test status");
                }
            }
        }

        false
    }

    /// Read the status artifact afresh and cache it.
    ///
    /// Fails softly (see [`LocalRunError::is_soft`]) while the run id or
    /// result store are still unknown, or while the file does not exist yet.
    pub fn current_status(&mut self) -> Result<TestStructure> {
        self.refresh_status()
    }

    /// Wait for the completion watcher to report that the process exited.
    pub async fn wait_for_exit(&mut self) -> Option<&std::result::Result<ProcessOutcome, String>> {
        if !self.completion_seen {
            if let Some(rx) = self.done_rx.as_mut() {
                match rx.recv().await {
                    Some(report) => self.absorb(report),
                    None => self.completion_seen = true,
                }
            }
        }
        if self.completion_seen {
            self.reached_terminal();
        }
        self.exit_outcome.as_ref()
    }

    /// One bounded discovery wait: block on the notification queue for at
    /// most a tick at a time, re-checking the monitor after every wake-up
    /// and giving up once the run is complete.
    async fn discover(
        &mut self,
        target: DiscoveryTarget,
        deadline: &DiscoveryDeadline,
    ) -> Result<String> {
        let result = self.discover_inner(target, deadline).await;
        if let Err(e) = &result {
            error!(waiting_for = %target, error = %e, "could not discover what is needed to monitor the run");
            self.set_phase(RunPhase::Failed);
            self.abandon_process();
        }
        result
    }

    async fn discover_inner(
        &mut self,
        target: DiscoveryTarget,
        deadline: &DiscoveryDeadline,
    ) -> Result<String> {
        loop {
            if let Some(value) = self.monitor.discovered(target) {
                return Ok(value);
            }

            if self.is_complete() {
                // Output is fully delivered before completion is reported,
                // so this look is final.
                self.drain_discoveries();
                return self
                    .monitor
                    .discovered(target)
                    .ok_or_else(|| self.not_detected(target));
            }

            let wait = deadline.next_wait(self.options.discovery_tick).ok_or_else(|| {
                LocalRunError::DiscoveryTimedOut {
                    waiting_for: target,
                    elapsed: deadline.elapsed(),
                }
            })?;

            match timeout(wait, self.discoveries.recv()).await {
                Ok(Some(discovery)) => {
                    debug!(?discovery, waiting_for = %target, "woken by the output monitor");
                }
                // Sender lives inside the monitor we hold, so this is not
                // expected; just avoid spinning.
                Ok(None) => sleep(wait).await,
                Err(_) => {}
            }
        }
    }

    /// Have the completion watcher kill the process if it is still running.
    fn abandon_process(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            // The watcher is gone once the process has exited.
            let _ = cancel_tx.send(());
        }
    }

    fn not_detected(&self, target: DiscoveryTarget) -> LocalRunError {
        match target {
            DiscoveryTarget::RunId => LocalRunError::RunIdNotDetected,
            DiscoveryTarget::RasLocation => LocalRunError::RasFolderNotDetected {
                run_id: self.monitor.run_id().unwrap_or_default(),
            },
        }
    }

    fn drain_discoveries(&mut self) {
        while let Ok(discovery) = self.discoveries.try_recv() {
            debug!(?discovery, "discarding notification after completion");
        }
    }

    /// Non-blocking look at the completion channel.
    fn poll_completion(&mut self) -> bool {
        if self.completion_seen {
            return true;
        }
        let Some(rx) = self.done_rx.as_mut() else {
            return false;
        };

        match rx.try_recv() {
            Ok(report) => {
                debug!(outcome = ?report.outcome, "completion report received from the watcher");
                self.absorb(report);
                true
            }
            Err(TryRecvError::Disconnected) => {
                self.completion_seen = true;
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }

    fn absorb(&mut self, report: CompletionReport) {
        self.completion_seen = true;
        if let Some(status) = report.final_status {
            self.latest_status = Some(status);
        }
        self.exit_outcome = Some(report.outcome);
    }

    fn refresh_status(&mut self) -> Result<TestStructure> {
        let (ras_location, run_id) = self
            .monitor
            .coordinates()
            .ok_or(LocalRunError::StatusNotYetAvailable)?;

        let status = self.reader.read(&ras_location, &run_id)?;
        self.latest_status = Some(status.clone());
        Ok(status)
    }

    fn terminal_observed(&self) -> bool {
        self.completion_seen || self.latest_status.as_ref().is_some_and(TestStructure::is_finished)
    }

    fn reached_terminal(&mut self) {
        if self.phase == RunPhase::Monitoring {
            self.set_phase(RunPhase::Terminal);
        }
    }

    fn set_phase(&mut self, phase: RunPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "run phase change");
            self.phase = phase;
        }
    }
}
