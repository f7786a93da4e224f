// src/monitor/mod.rs

//! Output monitoring for a running test process.
//!
//! The test process allocates its run identifier and chooses its result
//! archive store at runtime, and the only place either shows up is its trace
//! output. [`OutputMonitor`] sits on the process's output pipes, keeps a copy
//! of everything it sees and picks those two values (plus the framework
//! shutdown marker) out of the stream.
//!
//! Discovered values are stored in guarded state owned by the monitor and
//! also announced as [`Discovery`] messages on a bounded queue. Waiters
//! treat a message as "something changed, look again", never as proof that
//! the value they want is present.

use std::fmt;

pub mod detectors;
pub mod output_monitor;

pub use output_monitor::{MonitorSink, OutputMonitor, DEFAULT_NOTIFICATION_CAPACITY};

/// A notification pushed when the monitor learns something new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    RunIdAllocated(String),
    RasLocationFound(String),
    ShutdownObserved,
}

/// The pieces of information a discovery wait can be waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryTarget {
    RunId,
    RasLocation,
}

impl fmt::Display for DiscoveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryTarget::RunId => f.write_str("run identifier"),
            DiscoveryTarget::RasLocation => f.write_str("result archive store location"),
        }
    }
}
