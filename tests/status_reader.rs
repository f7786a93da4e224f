use std::path::PathBuf;
use std::sync::Arc;

use localrun::errors::{ArtifactError, LocalRunError};
use localrun::fs::mock::MockFileSystem;
use localrun::fs::{FileSystem, RealFileSystem};
use localrun::status::{ArtifactLocator, StatusReader};
use localrun_test_utils::builders::StatusJsonBuilder;

const RAS: &str = "file:///tmp/ras";

fn reader_with(fs: &MockFileSystem) -> StatusReader {
    StatusReader::new(Arc::new(fs.clone()), ArtifactLocator::default())
}

#[test]
fn test_path_strips_file_scheme() {
    let locator = ArtifactLocator::default();
    assert_eq!(
        locator.path_for("file:///home/u/.galasa/ras", "L0"),
        PathBuf::from("/home/u/.galasa/ras/L0/structure.json")
    );
}

#[test]
fn test_path_strips_slash_before_windows_drive() {
    let locator = ArtifactLocator::default();
    assert_eq!(
        locator.path_for("file:///C:/galasa/ras", "L0"),
        PathBuf::from("C:/galasa/ras").join("L0").join("structure.json")
    );
}

#[test]
fn test_path_without_scheme_is_used_as_is() {
    let locator = ArtifactLocator::default();
    assert_eq!(
        locator.path_for("/var/ras", "U1"),
        PathBuf::from("/var/ras/U1/structure.json")
    );
}

#[test]
fn test_reads_finished_passed_status() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json", StatusJsonBuilder::new("L0").build());

    let status = reader_with(&fs).read(RAS, "L0").unwrap();

    assert_eq!(status.run_name.as_deref(), Some("L0"));
    assert_eq!(status.bundle.as_deref(), Some("dev.galasa.examples.banking.account"));
    assert!(status.is_finished());
    assert!(status.is_passed());
    assert_eq!(status.methods.len(), 1);
    assert_eq!(status.methods[0].method_name(), "simpleSampleTest");
}

#[test]
fn test_running_status_is_not_finished() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/tmp/ras/L0/structure.json",
        StatusJsonBuilder::new("L0").running().build(),
    );

    let status = reader_with(&fs).read(RAS, "L0").unwrap();
    assert_eq!(status.status(), "running");
    assert!(!status.is_finished());
    assert!(status.result.is_none());
}

#[test]
fn test_missing_file_is_not_found() {
    let fs = MockFileSystem::new();
    let err = reader_with(&fs).read(RAS, "L0").unwrap_err();

    assert!(matches!(err, ArtifactError::NotFound { .. }));
    assert_eq!(err.path(), &PathBuf::from("/tmp/ras/L0/structure.json"));
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_empty_file_is_reported() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json", "");

    let err = reader_with(&fs).read(RAS, "L0").unwrap_err();
    assert!(matches!(err, ArtifactError::Empty { .. }));
    assert!(err.to_string().contains("is empty. Status could not be read"));
}

#[test]
fn test_malformed_json_keeps_parser_error() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json", "{ not json");

    let err = reader_with(&fs).read(RAS, "L0").unwrap_err();
    match &err {
        ArtifactError::Malformed { length, .. } => assert_eq!(*length, "{ not json".len()),
        other => panic!("expected Malformed, got {other:?}"),
    }
    assert!(err.to_string().contains("error unmarshalling"));
    let source = std::error::Error::source(&err).expect("parser error is kept as the source");
    assert!(source.is::<serde_json::Error>());
}

#[test]
fn test_directory_is_unreadable() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json/inner", "x");

    let err = reader_with(&fs).read(RAS, "L0").unwrap_err();
    assert!(matches!(err, ArtifactError::Unreadable { .. }));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/tmp/ras/L0/structure.json",
        r#"{"runName":"L0","status":"finished","result":"Failed","somethingNew":{"a":1}}"#,
    );

    let status = reader_with(&fs).read(RAS, "L0").unwrap();
    assert!(status.is_finished());
    assert!(!status.is_passed());
    assert!(status.methods.is_empty());
}

#[test]
fn test_custom_artifact_file_name() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/status.json", StatusJsonBuilder::new("L0").build());

    let locator = ArtifactLocator {
        file_name: "status.json".to_string(),
        ..ArtifactLocator::default()
    };
    let reader = StatusReader::new(Arc::new(fs), locator);
    assert!(reader.read(RAS, "L0").unwrap().is_passed());
}

#[test]
fn test_reads_from_real_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let ras = format!("file://{}", dir.path().display());
    let path = dir.path().join("U9").join("structure.json");

    RealFileSystem
        .write(&path, StatusJsonBuilder::new("U9").result("Failed").build().as_bytes())
        .unwrap();

    let reader = StatusReader::new(Arc::new(RealFileSystem), ArtifactLocator::default());
    let status = reader.read(&ras, "U9").unwrap();
    assert_eq!(status.run_name.as_deref(), Some("U9"));
    assert!(!status.is_passed());
}

#[test]
fn test_file_removed_after_being_written_is_not_found() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json", StatusJsonBuilder::new("L0").build());
    let reader = reader_with(&fs);
    assert!(reader.read(RAS, "L0").is_ok());

    assert!(fs.remove_file("/tmp/ras/L0/structure.json"));
    let err = reader.read(RAS, "L0").unwrap_err();
    assert!(matches!(err, ArtifactError::NotFound { .. }), "got {err:?}");
    assert!(LocalRunError::from(err).is_soft());
}

#[test]
fn test_non_utf8_content_is_malformed() {
    let fs = MockFileSystem::new();
    fs.add_file("/tmp/ras/L0/structure.json", vec![0xff, 0xfe, b'{']);

    let err = reader_with(&fs).read(RAS, "L0").unwrap_err();
    match &err {
        ArtifactError::Malformed { length, .. } => assert_eq!(*length, 3),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn test_missing_file_on_real_filesystem_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let ras = format!("file://{}", dir.path().display());

    let reader = StatusReader::new(Arc::new(RealFileSystem), ArtifactLocator::default());
    let err = reader.read(&ras, "U9").unwrap_err();
    assert!(matches!(err, ArtifactError::NotFound { .. }), "got {err:?}");
}
