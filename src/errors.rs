// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DlqueueError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    /// The batch was aborted by the caller's cancellation signal.
    #[error("Download queue cancelled")]
    Cancelled,

    #[error("{errors} download(s) can be retried, {failed} permanently failed")]
    DownloadsIncomplete { errors: usize, failed: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DlqueueError {
    /// Whether this error is the cancellation abort raised by the queue
    /// processor.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DlqueueError::Cancelled)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DlqueueError>;
