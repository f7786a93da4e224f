// src/status/model.rs

use serde::{Deserialize, Serialize};

/// Status value a run reports once it has stopped for good.
pub const FINISHED_STATUS: &str = "finished";

/// Snapshot of a test run, as written to `structure.json` by the test
/// process.
///
/// The document belongs to the test framework and evolves independently, so
/// every field is optional and unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStructure {
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub bundle: Option<String>,
    /// Fully qualified class name of the test.
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub test_short_name: Option<String>,
    #[serde(default)]
    pub requestor: Option<String>,
    /// e.g. `"queued"`, `"running"`, `"finished"`.
    #[serde(default)]
    pub status: Option<String>,
    /// e.g. `"Passed"`, `"Failed"`.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub queued: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub methods: Vec<TestMethod>,
}

impl TestStructure {
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    pub fn result(&self) -> &str {
        self.result.as_deref().unwrap_or("")
    }

    /// True once the run has reached its terminal status.
    pub fn is_finished(&self) -> bool {
        self.status() == FINISHED_STATUS
    }

    pub fn is_passed(&self) -> bool {
        self.result().eq_ignore_ascii_case("passed")
    }
}

/// Result of a single test method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMethod {
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default, rename = "type")]
    pub method_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub run_log_start: Option<i64>,
    #[serde(default)]
    pub run_log_end: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl TestMethod {
    pub fn method_name(&self) -> &str {
        self.method_name.as_deref().unwrap_or("")
    }
}
