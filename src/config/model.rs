// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::RunnerSettings;
use crate::exec::runner::{DEFAULT_SUBTITLE_LANG, DOWNLOAD_TIMEOUT};

pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub const DEFAULT_LOG_FILE: &str = "download.log";
pub const DEFAULT_TOOLS_DIR: &str = "tools";
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(15);

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [download]
/// output_dir = "downloads"
/// timeout = "30m"
/// subtitle_lang = "en"
/// log_file = "download.log"
/// auto_retry = true
///
/// [tools]
/// dir = "tools"
/// yt_dlp = "/opt/yt-dlp"
///
/// [metadata]
/// enabled = true
/// timeout = "15s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub download: RawDownloadSection,

    #[serde(default)]
    pub tools: ToolsSection,

    #[serde(default)]
    pub metadata: RawMetadataSection,
}

/// `[download]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDownloadSection {
    /// Directory the extraction tool writes into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-attempt deadline, e.g. `"30m"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Language passed to `--sub-lang` for jobs that want subtitles.
    #[serde(default = "default_subtitle_lang")]
    pub subtitle_lang: String,

    /// Diagnostic log path. An empty string disables the log.
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Re-run passes while some job is still retryable.
    #[serde(default = "default_true")]
    pub auto_retry: bool,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_timeout() -> String {
    "30m".to_string()
}

fn default_subtitle_lang() -> String {
    DEFAULT_SUBTITLE_LANG.to_string()
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RawDownloadSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout: default_timeout(),
            subtitle_lang: default_subtitle_lang(),
            log_file: default_log_file(),
            auto_retry: default_true(),
        }
    }
}

/// `[tools]` section: where to look for the extraction tool and the
/// post-processing helper.
///
/// Explicit paths win over `dir`, which wins over `PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// Directory probed for bundled executables.
    #[serde(default = "default_tools_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub yt_dlp: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe: Option<PathBuf>,
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TOOLS_DIR)
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            dir: default_tools_dir(),
            yt_dlp: None,
            ffmpeg: None,
            ffprobe: None,
        }
    }
}

/// `[metadata]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetadataSection {
    /// Fetch titles in the background after enqueue.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metadata_timeout")]
    pub timeout: String,
}

fn default_metadata_timeout() -> String {
    "15s".to_string()
}

impl Default for RawMetadataSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            timeout: default_metadata_timeout(),
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub download: DownloadConfig,
    pub tools: ToolsSection,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub subtitle_lang: String,
    pub log_file: Option<PathBuf>,
    pub auto_retry: bool,
}

impl DownloadConfig {
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            output_dir: self.output_dir.clone(),
            subtitle_lang: self.subtitle_lang.clone(),
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub timeout: Duration,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            download: DownloadConfig {
                output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
                timeout: DOWNLOAD_TIMEOUT,
                subtitle_lang: DEFAULT_SUBTITLE_LANG.to_string(),
                log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
                auto_retry: true,
            },
            tools: ToolsSection::default(),
            metadata: MetadataConfig {
                enabled: true,
                timeout: DEFAULT_METADATA_TIMEOUT,
            },
        }
    }
}
