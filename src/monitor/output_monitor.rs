// src/monitor/output_monitor.rs

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::exec::OutputSink;
use crate::types::OutputStream;

use super::detectors::{detect_ras_location, detect_run_id, detect_shutdown};
use super::{Discovery, DiscoveryTarget};

/// Default bound of the notification queue.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 10;

/// Longest unterminated line carried over between writes.
const MAX_PENDING_LINE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct MonitorState {
    /// Everything written so far, across both streams.
    collected: Vec<u8>,

    /// Unterminated trailing line per stream, indexed by `OutputStream::index`.
    pending: [String; 2],

    /// Bytes of a UTF-8 character cut off at the end of the last write, per
    /// stream.
    partial_char: [Vec<u8>; 2],

    run_id: Option<String>,
    ras_location: Option<String>,
    shutdown_observed: bool,
}

/// Templates found by one write.
#[derive(Debug, Default)]
struct Matches {
    run_id: Option<String>,
    ras_location: Option<String>,
    shutdown: bool,
}

impl Matches {
    /// Run the detectors over `pending + text`, counting only templates that
    /// `text` completes. A template sitting wholly in `pending` was counted
    /// by the write that completed it.
    fn scan(pending: &str, text: &str) -> Self {
        let window = format!("{pending}{text}");
        Self {
            run_id: completed_by(detect_run_id, pending, text, &window),
            ras_location: completed_by(detect_ras_location, pending, text, &window),
            shutdown: completed_by(|t| detect_shutdown(t).then_some(()), pending, text, &window)
                .is_some(),
        }
    }
}

fn completed_by<T>(
    detect: impl Fn(&str) -> Option<T>,
    pending: &str,
    text: &str,
    window: &str,
) -> Option<T> {
    if let Some(found) = detect(text) {
        return Some(found);
    }
    if detect(pending).is_some() {
        return None;
    }
    detect(window)
}

impl MonitorState {
    /// Record what one write matched and pick the single hint to publish
    /// for it: the first newly discovered value, else whatever matched
    /// again. `None` when nothing matched.
    ///
    /// A field, once set, is never cleared or replaced.
    fn record(&mut self, matches: Matches) -> Option<Discovery> {
        let mut fresh = None;
        let mut repeat = None;

        if let Some(run_id) = matches.run_id {
            match &self.run_id {
                None => {
                    info!(run_id = %run_id, "discovered the run id allocated to this test");
                    self.run_id = Some(run_id.clone());
                    fresh = fresh.or(Some(Discovery::RunIdAllocated(run_id)));
                }
                Some(existing) => {
                    if *existing != run_id {
                        warn!(
                            run_id = %existing,
                            ignored = %run_id,
                            "output announced a different run id; keeping the first"
                        );
                    }
                    repeat = repeat.or(Some(Discovery::RunIdAllocated(existing.clone())));
                }
            }
        }

        if let Some(location) = matches.ras_location {
            match &self.ras_location {
                None => {
                    info!(
                        run_id = self.run_id.as_deref().unwrap_or("-"),
                        ras = %location,
                        "discovered the result archive store for this test"
                    );
                    self.ras_location = Some(location.clone());
                    fresh = fresh.or(Some(Discovery::RasLocationFound(location)));
                }
                Some(existing) => {
                    if *existing != location {
                        warn!(
                            ras = %existing,
                            ignored = %location,
                            "output announced a different result archive store; keeping the first"
                        );
                    }
                    repeat = repeat.or(Some(Discovery::RasLocationFound(existing.clone())));
                }
            }
        }

        if matches.shutdown {
            if self.shutdown_observed {
                repeat = repeat.or(Some(Discovery::ShutdownObserved));
            } else {
                info!(
                    run_id = self.run_id.as_deref().unwrap_or("-"),
                    "framework shutdown observed in process output"
                );
                self.shutdown_observed = true;
                fresh = fresh.or(Some(Discovery::ShutdownObserved));
            }
        }

        fresh.or(repeat)
    }
}

/// Decode `bytes` as UTF-8. Invalid sequences become U+FFFD; an incomplete
/// character at the very end is returned undecoded so the next write can
/// finish it.
fn decode_utf8(mut bytes: &[u8]) -> (String, Vec<u8>) {
    let mut text = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, Vec::new());
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    None => return (text, rest.to_vec()),
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        bytes = &rest[len..];
                    }
                }
            }
        }
    }
}

/// Accumulates and interprets the output of one test process.
///
/// Written by the output pumps of the process, read by the orchestrator.
/// `write` never blocks on a reader: notifications use a non-blocking push
/// and are dropped (with a warning) when the queue is full.
#[derive(Debug)]
pub struct OutputMonitor {
    state: Mutex<MonitorState>,
    notify_tx: mpsc::Sender<Discovery>,
}

impl OutputMonitor {
    /// Create a monitor and the receiving end of its notification queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Discovery>) {
        let (notify_tx, notify_rx) = mpsc::channel(capacity.max(1));
        let monitor = Self {
            state: Mutex::new(MonitorState::default()),
            notify_tx,
        };
        (monitor, notify_rx)
    }

    /// A sink that feeds `stream` of a process into this monitor.
    pub fn sink(self: &Arc<Self>, stream: OutputStream) -> Arc<dyn OutputSink> {
        Arc::new(MonitorSink {
            monitor: Arc::clone(self),
            stream,
        })
    }

    /// Record a chunk of stdout.
    pub fn write(&self, chunk: &[u8]) -> io::Result<usize> {
        self.write_from(OutputStream::Stdout, chunk)
    }

    /// Record a chunk from `stream`, run the detectors and notify waiters
    /// once if any template was found.
    ///
    /// Detectors see the stream's unterminated previous line together with
    /// the new chunk, so a template split over two writes is still found.
    /// A UTF-8 character split over two writes is decoded once complete.
    pub fn write_from(&self, stream: OutputStream, chunk: &[u8]) -> io::Result<usize> {
        let hint = {
            let mut state = self.state.lock().map_err(|_| {
                io::Error::other("output monitor state is poisoned; process output lost")
            })?;
            state.collected.extend_from_slice(chunk);

            let slot = stream.index();
            let mut bytes = std::mem::take(&mut state.partial_char[slot]);
            bytes.extend_from_slice(chunk);
            let (text, partial_char) = decode_utf8(&bytes);
            state.partial_char[slot] = partial_char;

            let mut window = std::mem::take(&mut state.pending[slot]);
            let hint = state.record(Matches::scan(&window, &text));
            window.push_str(&text);

            let tail_start = window.rfind('\n').map(|i| i + 1).unwrap_or(0);
            let mut tail = window.split_off(tail_start);
            for line in window.lines() {
                echo_line(stream, state.run_id.as_deref(), line);
            }

            if tail.len() > MAX_PENDING_LINE {
                let mut cut = tail.len() - MAX_PENDING_LINE;
                while !tail.is_char_boundary(cut) {
                    cut += 1;
                }
                tail.drain(..cut);
            }
            state.pending[slot] = tail;

            hint
        };

        if let Some(discovery) = hint {
            self.publish(discovery);
        }

        Ok(chunk.len())
    }

    /// Flush the trailing unterminated line of `stream` to the log.
    pub fn finish_stream(&self, stream: OutputStream) {
        let mut state = self.lock();
        let slot = stream.index();
        let mut rest = std::mem::take(&mut state.pending[slot]);
        let partial_char = std::mem::take(&mut state.partial_char[slot]);
        rest.push_str(&String::from_utf8_lossy(&partial_char));
        if !rest.trim().is_empty() {
            echo_line(stream, state.run_id.as_deref(), &rest);
        }
    }

    pub fn run_id(&self) -> Option<String> {
        self.lock().run_id.clone()
    }

    pub fn ras_location(&self) -> Option<String> {
        self.lock().ras_location.clone()
    }

    pub fn shutdown_observed(&self) -> bool {
        self.lock().shutdown_observed
    }

    /// Current value of the field a discovery wait is looking for.
    pub fn discovered(&self, target: DiscoveryTarget) -> Option<String> {
        let state = self.lock();
        match target {
            DiscoveryTarget::RunId => state.run_id.clone(),
            DiscoveryTarget::RasLocation => state.ras_location.clone(),
        }
    }

    /// Result archive store location and run id, once both are known.
    pub fn coordinates(&self) -> Option<(String, String)> {
        let state = self.lock();
        match (&state.ras_location, &state.run_id) {
            (Some(ras), Some(run_id)) => Some((ras.clone(), run_id.clone())),
            _ => None,
        }
    }

    /// Raw bytes of everything the process has written so far.
    pub fn collected_output(&self) -> Vec<u8> {
        self.lock().collected.clone()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().collected).into_owned()
    }

    fn publish(&self, discovery: Discovery) {
        match self.notify_tx.try_send(discovery) {
            Ok(()) => {}
            Err(TrySendError::Full(discovery)) => {
                warn!(?discovery, "notification queue is full; dropping notification");
            }
            Err(TrySendError::Closed(discovery)) => {
                debug!(?discovery, "nobody is listening for output notifications");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // Readers still get the last recorded values after a writer panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputSink for OutputMonitor {
    fn write(&self, chunk: &[u8]) -> io::Result<usize> {
        self.write_from(OutputStream::Stdout, chunk)
    }

    fn finish(&self) {
        self.finish_stream(OutputStream::Stdout);
    }
}

/// One stream of a process, wired into a shared [`OutputMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorSink {
    monitor: Arc<OutputMonitor>,
    stream: OutputStream,
}

impl OutputSink for MonitorSink {
    fn write(&self, chunk: &[u8]) -> io::Result<usize> {
        self.monitor.write_from(self.stream, chunk)
    }

    fn finish(&self) {
        self.monitor.finish_stream(self.stream);
    }
}

fn echo_line(stream: OutputStream, run_id: Option<&str>, line: &str) {
    debug!(
        target: crate::logging::PROCESS_OUTPUT_TARGET,
        %stream,
        run_id = run_id.unwrap_or("-"),
        "{}",
        line.trim_end()
    );
}
