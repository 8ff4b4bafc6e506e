// src/exec/backend.rs

//! Pluggable download backend abstraction.
//!
//! The queue processor talks to a `DownloadBackend` instead of spawning
//! processes itself. This keeps the skip/retry/abort policy testable without
//! a real extraction tool.
//!
//! - `ProcessRunner` is the production implementation; it runs the external
//!   tool and kills it on cancellation or timeout.
//! - Tests can provide their own `DownloadBackend` that, for example, records
//!   which jobs were attempted and returns scripted outcomes.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::job::Job;

use super::Outcome;
use super::runner::ProcessRunner;

/// Trait abstracting how a single job is downloaded.
pub trait DownloadBackend: Send + Sync {
    /// Whether downloads can run at all (e.g. the extraction tool exists).
    fn is_available(&self) -> bool;

    /// Run one attempt for `job`.
    ///
    /// The implementation moves the job to `Downloading` once the attempt has
    /// actually started and may report progress on it. It does not record the
    /// final status; the caller applies the returned [`Outcome`].
    fn run<'a>(
        &'a self,
        job: &'a Job,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;

    /// Terminate whatever attempt is in flight. Returns whether anything was
    /// running.
    fn cancel_current(&self) -> bool;
}

impl DownloadBackend for ProcessRunner {
    fn is_available(&self) -> bool {
        self.toolchain().extractor().is_some()
    }

    fn run<'a>(
        &'a self,
        job: &'a Job,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(ProcessRunner::run(self, job, cancel))
    }

    fn cancel_current(&self) -> bool {
        self.slot().kill_current()
    }
}
