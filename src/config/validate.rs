// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, DiscoveryConfig, RawConfigFile, RawDiscoverySection, RawStatusSection,
    StatusConfig,
};
use crate::errors::{LocalRunError, Result};
use crate::status::ArtifactLocator;
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = LocalRunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_launch(&raw)?;
        let discovery = validate_discovery(&raw.discovery)?;
        let status = validate_status(&raw.status)?;
        Ok(ConfigFile::new_unchecked(raw.launch, discovery, status))
    }
}

fn validate_launch(cfg: &RawConfigFile) -> Result<()> {
    if let Some(command) = &cfg.launch.command {
        if command.trim().is_empty() {
            return Err(LocalRunError::ConfigError(
                "[launch].command must not be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_discovery(raw: &RawDiscoverySection) -> Result<DiscoveryConfig> {
    if raw.notification_capacity == 0 {
        return Err(LocalRunError::ConfigError(
            "[discovery].notification_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    let tick = non_zero_duration("[discovery].tick", &raw.tick)?;
    let timeout = raw
        .timeout
        .as_deref()
        .map(|t| non_zero_duration("[discovery].timeout", t))
        .transpose()?;

    Ok(DiscoveryConfig {
        tick,
        timeout,
        notification_capacity: raw.notification_capacity,
    })
}

fn validate_status(raw: &RawStatusSection) -> Result<StatusConfig> {
    if raw.artifact_file_name.trim().is_empty() {
        return Err(LocalRunError::ConfigError(
            "[status].artifact_file_name must not be empty".to_string(),
        ));
    }

    let poll_interval = non_zero_duration("[status].poll_interval", &raw.poll_interval)?;

    Ok(StatusConfig {
        locator: ArtifactLocator {
            file_name: raw.artifact_file_name.clone(),
            scheme_prefix: raw.scheme_prefix.clone(),
        },
        poll_interval,
        filesystem_fallback: raw.filesystem_fallback,
    })
}

fn non_zero_duration(key: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| LocalRunError::ConfigError(format!("{key}: {e}")))?;
    if dur.is_zero() {
        return Err(LocalRunError::ConfigError(format!(
            "{key} must be greater than zero (got \"{value}\")"
        )));
    }
    Ok(dur)
}
