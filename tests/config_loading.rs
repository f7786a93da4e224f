use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use localrun::config::{load_and_validate, load_or_default};
use localrun::errors::LocalRunError;
use localrun::types::parse_duration;
use localrun_test_utils::builders::ConfigFileBuilder;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_is_parsed() {
    let file = write_config(
        r#"
[launch]
command = "java"
args = ["-jar", "boot.jar", "--obr", "mvn:dev.galasa/dev.galasa.uber.obr/0.26.0/obr"]

[discovery]
tick = "250ms"
timeout = "10m"
notification_capacity = 4

[status]
artifact_file_name = "status.json"
scheme_prefix = "file://"
poll_interval = "3s"
filesystem_fallback = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.launch().command.as_deref(), Some("java"));
    assert_eq!(cfg.launch().args.len(), 4);
    assert_eq!(cfg.discovery().tick, Duration::from_millis(250));
    assert_eq!(cfg.discovery().timeout, Some(Duration::from_secs(600)));
    assert_eq!(cfg.discovery().notification_capacity, 4);
    assert_eq!(cfg.status().locator.file_name, "status.json");
    assert_eq!(cfg.status().poll_interval, Duration::from_secs(3));
    assert!(!cfg.status().filesystem_fallback);

    let opts = cfg.run_options();
    assert_eq!(opts.discovery_tick, Duration::from_millis(250));
    assert!(!opts.filesystem_fallback);
}

#[test]
fn test_empty_config_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert!(cfg.launch().command.is_none());
    assert_eq!(cfg.discovery().tick, Duration::from_secs(1));
    assert_eq!(cfg.discovery().timeout, None);
    assert_eq!(cfg.discovery().notification_capacity, 10);
    assert_eq!(cfg.status().locator.file_name, "structure.json");
    assert_eq!(cfg.status().locator.scheme_prefix, "file://");
    assert_eq!(cfg.status().poll_interval, Duration::from_secs(2));
    assert!(cfg.status().filesystem_fallback);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(dir.path().join("Localrun.toml")).unwrap();
    assert_eq!(cfg.run_options(), localrun::engine::RunOptions::default());
}

#[test]
fn test_missing_file_is_an_error_when_required() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Localrun.toml")).unwrap_err();
    assert!(matches!(err, LocalRunError::IoError(_)));
}

#[test]
fn test_bad_duration_is_rejected() {
    let file = write_config("[discovery]\ntick = \"soon\"\n");
    match load_and_validate(file.path()) {
        Err(LocalRunError::ConfigError(msg)) => assert!(msg.contains("[discovery].tick")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_overflowing_duration_is_an_error() {
    let err = parse_duration("307445734561825861m").unwrap_err();
    assert!(err.contains("overflows"), "{err}");
    assert!(parse_duration("5124095576030432h").is_err());

    // Largest values that still fit.
    assert!(parse_duration("307445734561825860m").is_ok());
    assert!(parse_duration("5124095576030431h").is_ok());
}

#[test]
fn test_overflowing_duration_in_config_is_rejected() {
    let file = write_config("[status]\npoll_interval = \"5124095576030432h\"\n");
    match load_and_validate(file.path()) {
        Err(LocalRunError::ConfigError(msg)) => {
            assert!(msg.contains("[status].poll_interval"), "{msg}");
            assert!(msg.contains("overflows"), "{msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_zero_capacity_is_rejected() {
    let file = write_config("[discovery]\nnotification_capacity = 0\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LocalRunError::ConfigError(_))
    ));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let file = write_config("[status]\npoll_interval = \"0s\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LocalRunError::ConfigError(_))
    ));
}

#[test]
fn test_blank_command_is_rejected() {
    let file = write_config("[launch]\ncommand = \"  \"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LocalRunError::ConfigError(_))
    ));
}

#[test]
fn test_invalid_toml_is_reported() {
    let file = write_config("[launch\ncommand = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LocalRunError::TomlError(_))
    ));
}

#[test]
fn test_command_override_replaces_configured_command() {
    let cfg = ConfigFileBuilder::new()
        .with_command("java", &["-jar", "old.jar"])
        .build()
        .with_command("sh".to_string(), vec!["-c".to_string(), "true".to_string()]);

    assert_eq!(cfg.launch().command.as_deref(), Some("sh"));
    assert_eq!(cfg.launch().args, vec!["-c", "true"]);
}

#[test]
fn test_builder_timeout_reaches_run_options() {
    let cfg = ConfigFileBuilder::new()
        .with_tick("100ms")
        .with_timeout("30s")
        .with_filesystem_fallback(false)
        .build();

    let opts = cfg.run_options();
    assert_eq!(opts.discovery_tick, Duration::from_millis(100));
    assert_eq!(opts.discovery_timeout, Some(Duration::from_secs(30)));
    assert!(!opts.filesystem_fallback);
}
