// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::RunOptions;
use crate::monitor::DEFAULT_NOTIFICATION_CAPACITY;
use crate::status::{ArtifactLocator, DEFAULT_ARTIFACT_FILE_NAME, DEFAULT_SCHEME_PREFIX};

/// Configuration exactly as read from a TOML file.
///
/// ```toml
/// [launch]
/// command = "java"
/// args = ["-jar", "boot.jar"]
///
/// [discovery]
/// tick = "1s"
/// timeout = "10m"
/// notification_capacity = 10
///
/// [status]
/// artifact_file_name = "structure.json"
/// scheme_prefix = "file://"
/// poll_interval = "2s"
/// filesystem_fallback = true
/// ```
///
/// All sections are optional. Durations are still strings here; they are
/// parsed when converting into [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub launch: LaunchSection,

    #[serde(default)]
    pub discovery: RawDiscoverySection,

    #[serde(default)]
    pub status: RawStatusSection,
}

/// `[launch]`: the already-built command line of the test process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchSection {
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// `[discovery]`
#[derive(Debug, Clone, Deserialize)]
pub struct RawDiscoverySection {
    /// Longest single wait on the notification queue.
    #[serde(default = "default_tick")]
    pub tick: String,

    /// Overall deadline for discovering the run id and result store.
    /// No deadline when unset.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_tick() -> String {
    "1s".to_string()
}

fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

impl Default for RawDiscoverySection {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            timeout: None,
            notification_capacity: default_notification_capacity(),
        }
    }
}

/// `[status]`
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusSection {
    #[serde(default = "default_artifact_file_name")]
    pub artifact_file_name: String,

    #[serde(default = "default_scheme_prefix")]
    pub scheme_prefix: String,

    /// How often the binary polls a running test for completion.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Whether a completion check may re-read the status artifact when the
    /// process has not been seen exiting yet.
    #[serde(default = "default_filesystem_fallback")]
    pub filesystem_fallback: bool,
}

fn default_artifact_file_name() -> String {
    DEFAULT_ARTIFACT_FILE_NAME.to_string()
}

fn default_scheme_prefix() -> String {
    DEFAULT_SCHEME_PREFIX.to_string()
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_filesystem_fallback() -> bool {
    true
}

impl Default for RawStatusSection {
    fn default() -> Self {
        Self {
            artifact_file_name: default_artifact_file_name(),
            scheme_prefix: default_scheme_prefix(),
            poll_interval: default_poll_interval(),
            filesystem_fallback: default_filesystem_fallback(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// every duration here has been parsed and checked.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    launch: LaunchSection,
    discovery: DiscoveryConfig,
    status: StatusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub tick: Duration,
    pub timeout: Option<Duration>,
    pub notification_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    pub locator: ArtifactLocator,
    pub poll_interval: Duration,
    pub filesystem_fallback: bool,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        launch: LaunchSection,
        discovery: DiscoveryConfig,
        status: StatusConfig,
    ) -> Self {
        Self {
            launch,
            discovery,
            status,
        }
    }

    pub fn launch(&self) -> &LaunchSection {
        &self.launch
    }

    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    pub fn status(&self) -> &StatusConfig {
        &self.status
    }

    /// Replace the configured command line (e.g. from the CLI).
    pub fn with_command(mut self, command: String, args: Vec<String>) -> Self {
        self.launch.command = Some(command);
        self.launch.args = args;
        self
    }

    /// Options handed down to each `LocalRun`.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            discovery_tick: self.discovery.tick,
            discovery_timeout: self.discovery.timeout,
            notification_capacity: self.discovery.notification_capacity,
            locator: self.status.locator.clone(),
            filesystem_fallback: self.status.filesystem_fallback,
        }
    }
}
