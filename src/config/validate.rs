// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, DownloadConfig, MetadataConfig, RawConfigFile, RawDownloadSection,
    RawMetadataSection,
};
use crate::errors::{DlqueueError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DlqueueError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        Ok(ConfigFile {
            download: validate_download(raw.download)?,
            tools: raw.tools,
            metadata: validate_metadata(raw.metadata)?,
        })
    }
}

fn validate_download(raw: RawDownloadSection) -> Result<DownloadConfig> {
    if raw.output_dir.trim().is_empty() {
        return Err(DlqueueError::ConfigError(
            "[download].output_dir must not be empty".to_string(),
        ));
    }

    let subtitle_lang = raw.subtitle_lang.trim();
    if subtitle_lang.is_empty() {
        return Err(DlqueueError::ConfigError(
            "[download].subtitle_lang must not be empty".to_string(),
        ));
    }

    let log_file = raw.log_file.trim();

    Ok(DownloadConfig {
        output_dir: PathBuf::from(raw.output_dir.trim()),
        timeout: positive_duration("[download].timeout", &raw.timeout)?,
        subtitle_lang: subtitle_lang.to_string(),
        log_file: (!log_file.is_empty()).then(|| PathBuf::from(log_file)),
        auto_retry: raw.auto_retry,
    })
}

fn validate_metadata(raw: RawMetadataSection) -> Result<MetadataConfig> {
    Ok(MetadataConfig {
        enabled: raw.enabled,
        timeout: positive_duration("[metadata].timeout", &raw.timeout)?,
    })
}

fn positive_duration(key: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value)
        .map_err(|e| DlqueueError::ConfigError(format!("{key}: {e}")))?;
    if duration.is_zero() {
        return Err(DlqueueError::ConfigError(format!(
            "{key} must be greater than zero (got '{value}')"
        )));
    }
    Ok(duration)
}
