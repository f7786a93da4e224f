// src/monitor/detectors.rs

//! Stateless pattern detectors run over test process output.
//!
//! Each detector only looks at the text it is handed; remembering what was
//! already found is the monitor's job.

use std::sync::LazyLock;

use regex::Regex;

/// Marker traced by the framework when its runtime is ending.
pub const SHUTDOWN_MARKER: &str = "d.g.f.Framework - Framework shutdown";

// e.g. "d.g.f.FrameworkInitialisation - Allocated Run Name U525 to this run"
static RUN_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Allocated Run Name (?P<runid>\S+) to this run").expect("run id pattern is valid")
});

// e.g. "Result Archive Stores are [file:///home/user/.galasa/ras]"
static RAS_LOCATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Result Archive Stores are \[(?P<ras>[^\]\r\n]+)\]")
        .expect("result archive store pattern is valid")
});

/// Extract the allocated run name, if `text` announces one.
pub fn detect_run_id(text: &str) -> Option<String> {
    RUN_ID_REGEX
        .captures(text)
        .and_then(|caps| caps.name("runid"))
        .map(|m| m.as_str().to_string())
}

/// Extract the result archive store location, if `text` announces one.
pub fn detect_ras_location(text: &str) -> Option<String> {
    RAS_LOCATION_REGEX
        .captures(text)
        .and_then(|caps| caps.name("ras"))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn detect_shutdown(text: &str) -> bool {
    text.contains(SHUTDOWN_MARKER)
}
