// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for starting the external test process with
//! `tokio::process::Command` and streaming its output into sinks, knowing
//! nothing about what that output means.
//!
//! - [`backend`] provides the `ProcessHandle` / `ProcessFactory` traits and
//!   the `OutputSink` trait the orchestrator plugs the output monitor into.
//! - [`process`] contains the real `TokioProcess` used in production.
//! - [`pump`] copies a child pipe into a sink, chunk by chunk.

pub mod backend;
pub mod process;
pub mod pump;

pub use backend::{OutputSink, ProcessFactory, ProcessHandle, ProcessOutcome};
pub use process::{TokioProcess, TokioProcessFactory};
