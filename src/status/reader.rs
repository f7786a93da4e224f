// src/status/reader.rs

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::errors::ArtifactError;
use crate::fs::FileSystem;

use super::model::TestStructure;

pub const DEFAULT_ARTIFACT_FILE_NAME: &str = "structure.json";
pub const DEFAULT_SCHEME_PREFIX: &str = "file://";

/// Turns a discovered result archive store location plus run id into the
/// path of the run's status artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    pub file_name: String,
    pub scheme_prefix: String,
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_ARTIFACT_FILE_NAME.to_string(),
            scheme_prefix: DEFAULT_SCHEME_PREFIX.to_string(),
        }
    }
}

impl ArtifactLocator {
    /// `<location without scheme>/<run_id>/<file_name>`.
    ///
    /// `file:///home/u/ras` becomes `/home/u/ras`; a Windows style
    /// `file:///C:/ras` becomes `C:/ras`. A location without the scheme is
    /// used as-is.
    pub fn path_for(&self, ras_location: &str, run_id: &str) -> PathBuf {
        let mut base = ras_location
            .strip_prefix(self.scheme_prefix.as_str())
            .unwrap_or(ras_location);

        if has_drive_letter_after_slash(base) {
            base = &base[1..];
        }

        PathBuf::from(base).join(run_id).join(&self.file_name)
    }
}

// "/C:/..." -> true
fn has_drive_letter_after_slash(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 3 && b[0] == b'/' && b[1].is_ascii_alphabetic() && b[2] == b':'
}

/// Reads and parses status artifacts through a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct StatusReader {
    fs: Arc<dyn FileSystem>,
    locator: ArtifactLocator,
}

impl StatusReader {
    pub fn new(fs: Arc<dyn FileSystem>, locator: ArtifactLocator) -> Self {
        Self { fs, locator }
    }

    /// Read the status snapshot of `run_id` under `ras_location`.
    pub fn read(&self, ras_location: &str, run_id: &str) -> Result<TestStructure, ArtifactError> {
        let path = self.locator.path_for(ras_location, run_id);
        debug!(run_id, path = %path.display(), "reading latest test status");
        self.read_path(path)
    }

    /// Read and parse the status artifact at an explicit path.
    ///
    /// Content that is not valid UTF-8 is reported as malformed, like any
    /// other document the parser rejects.
    pub fn read_path(&self, path: PathBuf) -> Result<TestStructure, ArtifactError> {
        let contents = match self.fs.read(&path) {
            Ok(contents) => contents,
            Err(e) if is_not_found(&e) => return Err(ArtifactError::NotFound { path }),
            Err(e) => {
                return Err(ArtifactError::Unreadable {
                    path,
                    source: e.into(),
                });
            }
        };

        if contents.is_empty() {
            return Err(ArtifactError::Empty { path });
        }

        serde_json::from_slice::<TestStructure>(&contents).map_err(|source| ArtifactError::Malformed {
            length: contents.len(),
            path,
            source,
        })
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}
