#![allow(dead_code)]

use serde_json::{json, Value};
use localrun::config::{ConfigFile, RawConfigFile};

/// Framework trace line announcing the allocated run name.
pub fn run_id_line(run_id: &str) -> String {
    format!(
        "14/02/2023 12:19:11.990 INFO  d.g.f.FrameworkInitialisation - Allocated Run Name {run_id} to this run"
    )
}

/// Framework trace line announcing the result archive store.
pub fn ras_line(location: &str) -> String {
    format!("14/02/2023 12:19:11.991 INFO  d.g.f.FrameworkInitialisation - Result Archive Stores are [{location}]")
}

pub fn shutdown_line() -> String {
    "14/02/2023 12:19:15.002 INFO  d.g.f.Framework - Framework shutdown".to_string()
}

/// Builder for the JSON a test process writes to `structure.json`.
///
/// Starts from a realistic finished, passed run with one method.
pub struct StatusJsonBuilder {
    doc: Value,
}

impl StatusJsonBuilder {
    pub fn new(run_name: &str) -> Self {
        Self {
            doc: json!({
                "runName": run_name,
                "bundle": "dev.galasa.examples.banking.account",
                "testName": "dev.galasa.examples.banking.account.TestAccount",
                "testShortName": "TestAccount",
                "requestor": "tester",
                "status": "finished",
                "result": "Passed",
                "queued": "2023-02-14T12:19:10.100Z",
                "startTime": "2023-02-14T12:19:11.000Z",
                "endTime": "2023-02-14T12:19:14.900Z",
                "methods": [
                    {
                        "className": "dev.galasa.examples.banking.account.TestAccount",
                        "methodName": "simpleSampleTest",
                        "type": "Test",
                        "status": "finished",
                        "result": "Passed",
                        "runLogStart": 0,
                        "runLogEnd": 0,
                        "befores": [],
                        "afters": []
                    }
                ]
            }),
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.doc["status"] = json!(status);
        self
    }

    pub fn result(mut self, result: &str) -> Self {
        self.doc["result"] = json!(result);
        self
    }

    /// Still running: status `running`, no result yet.
    pub fn running(self) -> Self {
        let mut b = self.status("running");
        if let Some(obj) = b.doc.as_object_mut() {
            obj.remove("result");
        }
        b
    }

    pub fn build(self) -> String {
        self.doc.to_string()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_command(mut self, command: &str, args: &[&str]) -> Self {
        self.config.launch.command = Some(command.to_string());
        self.config.launch.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tick(mut self, tick: &str) -> Self {
        self.config.discovery.tick = tick.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.discovery.timeout = Some(timeout.to_string());
        self
    }

    pub fn with_filesystem_fallback(mut self, enabled: bool) -> Self {
        self.config.status.filesystem_fallback = enabled;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
