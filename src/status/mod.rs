// src/status/mod.rs

//! Status artifact reading.
//!
//! A test process records the state of its run in a JSON document inside
//! the result archive store. This module derives where that document lives
//! and parses it into a [`TestStructure`]; interpreting test results beyond
//! "has it finished, and with what result" is left to callers.

pub mod model;
pub mod reader;

pub use model::{TestMethod, TestStructure, FINISHED_STATUS};
pub use reader::{ArtifactLocator, StatusReader, DEFAULT_ARTIFACT_FILE_NAME, DEFAULT_SCHEME_PREFIX};
