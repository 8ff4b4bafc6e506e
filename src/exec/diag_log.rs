// src/exec/diag_log.rs

//! Append-only diagnostic log for post-mortem debugging.
//!
//! Every significant download event (start, command line, each output line,
//! exit code, errors) is appended as one line:
//!
//! ```text
//! [2025-01-31 14:02:11] [STDOUT] [download]  12.5% of 3.20MiB
//! ```
//!
//! This is a side channel next to `tracing`; a failed write is reported at
//! `warn` and never interrupts a download.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Local;
use tracing::warn;

/// Severity / stream tag written in the second bracket of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Stdout,
    Stderr,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Stdout => "STDOUT",
            LogLevel::Stderr => "STDERR",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Mutex::new(()),
        }
    }

    /// A log that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Error, message.as_ref());
    }

    pub fn write(&self, level: LogLevel, message: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let line = format!(
            "[{}] [{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.as_str(),
            message
        );

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to write diagnostic log");
        }
    }
}
