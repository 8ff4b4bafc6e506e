// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs the external extraction tool for one job at a time using
//! `tokio::process::Command`, and turns what the process does into an
//! [`Outcome`] for the queue processor.
//!
//! - [`runner`] spawns the tool, streams stdout/stderr and enforces the
//!   timeout and cancellation.
//! - [`args`] builds the tool's argument vector from the job options.
//! - [`progress`] recognises progress lines on stdout.
//! - [`classify`] maps stderr + exit code to a user-facing error message.
//! - [`process`] owns the shared "current process" slot and tree killing.
//! - [`diag_log`] is the append-only diagnostic log.
//! - [`backend`] provides the `DownloadBackend` trait the processor talks to;
//!   `ProcessRunner` is the production implementation and tests swap in
//!   fakes.

pub mod args;
pub mod backend;
pub mod classify;
pub mod diag_log;
pub mod process;
pub mod progress;
pub mod runner;

pub use backend::DownloadBackend;
pub use classify::classify_failure;
pub use diag_log::DiagnosticLog;
pub use process::ProcessSlot;
pub use progress::parse_progress_line;
pub use runner::{ProcessRunner, RunnerSettings};

/// Prefix for failures that indicate a bug or an environment problem rather
/// than a download error reported by the tool.
pub const UNEXPECTED_ERROR_PREFIX: &str = "Unexpected error: ";

/// Result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tool exited with code 0.
    Finished,
    /// The tool failed (or could not be run); the message is user-facing.
    Error(String),
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The per-download deadline elapsed.
    TimedOut(String),
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Error(message) | Outcome::TimedOut(message) => Some(message),
            Outcome::Finished | Outcome::Cancelled => None,
        }
    }
}
