// src/tools.rs

//! Locates the external executables: the extraction tool (`yt-dlp`) and the
//! post-processing helper (`ffmpeg` + `ffprobe`).
//!
//! Resolution order for every tool:
//! 1. an explicit path from `[tools]`, if that file exists;
//! 2. `<tools.dir>/<name>` (with `.exe` on Windows);
//! 3. a `PATH` lookup via `which`.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::ToolsSection;

pub const EXTRACTOR_NAME: &str = "yt-dlp";
pub const HELPER_NAME: &str = "ffmpeg";
pub const PROBE_NAME: &str = "ffprobe";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Resolved {
    extractor: Option<PathBuf>,
    helper: Option<PathBuf>,
}

/// Resolved tool paths, shared by `Arc` between the runner and the title
/// fetcher. [`Toolchain::refresh`] re-runs detection in place.
#[derive(Debug, Default)]
pub struct Toolchain {
    /// `None` when built from fixed paths.
    config: Option<ToolsSection>,
    resolved: RwLock<Resolved>,
}

impl Toolchain {
    /// Detect tools according to `config`.
    pub fn discover(config: &ToolsSection) -> Self {
        let toolchain = Self {
            config: Some(config.clone()),
            resolved: RwLock::new(Resolved::default()),
        };
        toolchain.refresh();
        toolchain
    }

    /// Use fixed paths without any detection. `refresh` keeps them.
    pub fn from_paths(extractor: Option<PathBuf>, helper: Option<PathBuf>) -> Self {
        Self {
            config: None,
            resolved: RwLock::new(Resolved { extractor, helper }),
        }
    }

    /// Re-run detection, e.g. after the user installed a tool.
    pub fn refresh(&self) {
        let Some(config) = &self.config else {
            return;
        };

        let extractor = locate(EXTRACTOR_NAME, config.yt_dlp.as_deref(), &config.dir);
        let ffmpeg = locate(HELPER_NAME, config.ffmpeg.as_deref(), &config.dir);
        let ffprobe = locate(PROBE_NAME, config.ffprobe.as_deref(), &config.dir);

        let helper = match (ffmpeg, ffprobe) {
            (Some(ffmpeg), Some(_)) => Some(ffmpeg),
            (Some(ffmpeg), None) => {
                warn!(ffmpeg = %ffmpeg.display(), "ffprobe not found; post-processing disabled");
                None
            }
            _ => None,
        };

        let next = Resolved { extractor, helper };
        info!(
            extractor = ?next.extractor,
            helper = ?next.helper,
            "tool detection complete"
        );

        *self.resolved.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn extractor(&self) -> Option<PathBuf> {
        self.read().extractor
    }

    pub fn helper(&self) -> Option<PathBuf> {
        self.read().helper
    }

    pub fn is_extractor_available(&self) -> bool {
        self.read().extractor.is_some()
    }

    pub fn is_helper_available(&self) -> bool {
        self.read().helper.is_some()
    }

    fn read(&self) -> Resolved {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn locate(name: &str, configured: Option<&Path>, dir: &Path) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(tool = name, path = %path.display(), "configured tool path does not exist");
    }

    if !dir.as_os_str().is_empty() {
        let bundled = dir.join(executable_name(name));
        if bundled.is_file() {
            debug!(tool = name, path = %bundled.display(), "using bundled tool");
            return Some(bundled);
        }
    }

    match which::which(name) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!(tool = name, error = %e, "tool not found on PATH");
            None
        }
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}
