// src/errors.rs

//! Crate-wide error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::monitor::DiscoveryTarget;

/// Boxed error used where a leaf collaborator reports an `anyhow::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum LocalRunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to launch test process '{command}': {source}")]
    LaunchFailure {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("this run has already been launched; a process handle is never reused")]
    AlreadyLaunched,

    #[error("the test process completed before a run identifier was detected in its output")]
    RunIdNotDetected,

    #[error(
        "the test process for run {run_id} completed before the result archive store location was detected in its output"
    )]
    RasFolderNotDetected { run_id: String },

    #[error("timed out after {elapsed:?} waiting for the {waiting_for} to appear in the test process output")]
    DiscoveryTimedOut {
        waiting_for: DiscoveryTarget,
        elapsed: Duration,
    },

    #[error("not enough information to find the status artifact yet; the test process is starting up")]
    StatusNotYetAvailable,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LocalRunError {
    /// Soft errors mean "nothing to read yet": poll again later.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            LocalRunError::StatusNotYetAvailable
                | LocalRunError::Artifact(ArtifactError::NotFound { .. })
        )
    }
}

/// Failures reading the status artifact a test process leaves on disk.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The process has not written the file yet.
    #[error("status file '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("status file '{}' is empty. Status could not be read", .path.display())]
    Empty { path: PathBuf },

    #[error(
        "error unmarshalling status file '{}' ({length} bytes) into a test structure: {source}",
        .path.display()
    )]
    Malformed {
        path: PathBuf,
        length: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read status file '{}': {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl ArtifactError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ArtifactError::NotFound { path }
            | ArtifactError::Empty { path }
            | ArtifactError::Malformed { path, .. }
            | ArtifactError::Unreadable { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalRunError>;
