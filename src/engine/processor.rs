// src/engine/processor.rs

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{DlqueueError, Result};
use crate::exec::DownloadBackend;
use crate::job::Job;
use crate::types::JobStatus;

/// Drives jobs through a [`DownloadBackend`] one at a time, in queue order.
///
/// Per-job failures are recorded on the job and absorbed; only cancellation
/// stops a pass early.
pub struct QueueProcessor<B: DownloadBackend> {
    backend: B,
}

impl<B: DownloadBackend> fmt::Debug for QueueProcessor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProcessor")
            .field("available", &self.backend.is_available())
            .finish_non_exhaustive()
    }
}

impl<B: DownloadBackend> QueueProcessor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Run one processing pass over `jobs`.
    ///
    /// - `Finished`, `Cancelled` and `Failed` jobs are skipped.
    /// - An `Error` job is retried while `retry_count < MAX_RETRIES`,
    ///   otherwise it becomes `Failed` without being run.
    /// - When `cancel` fires, every job still pending after the current one
    ///   becomes `Cancelled` and `DlqueueError::Cancelled` is returned.
    ///
    /// Does nothing when the backend is unavailable, unless `cancel` has
    /// already fired.
    pub async fn process_queue(&self, jobs: &[Arc<Job>], cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(abort(jobs));
        }
        if !self.backend.is_available() {
            warn!("download tool unavailable; not processing queue");
            return Ok(());
        }

        info!(jobs = jobs.len(), "processing queue");

        for (idx, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(abort(&jobs[idx..]));
            }

            match job.status() {
                JobStatus::Finished | JobStatus::Cancelled | JobStatus::Failed => {
                    debug!(job = job.id(), status = %job.status(), "skipping");
                    continue;
                }
                JobStatus::Error => {
                    if job.retry_count() >= Job::MAX_RETRIES {
                        info!(
                            job = job.id(),
                            retries = job.retry_count(),
                            "retries exhausted; marking failed"
                        );
                        job.mark_failed();
                        continue;
                    }
                    let attempt = job.increment_retry();
                    info!(job = job.id(), attempt, url = %job.url(), "retrying download");
                }
                JobStatus::Queued | JobStatus::FetchingInfo | JobStatus::Downloading => {}
            }

            let outcome = self.backend.run(job, cancel).await;
            match outcome.message() {
                Some(message) => warn!(job = job.id(), %message, "download attempt failed"),
                None => debug!(job = job.id(), ?outcome, "download attempt finished"),
            }
            job.apply_outcome(&outcome);

            if outcome.is_cancelled() {
                return Err(abort(&jobs[idx + 1..]));
            }
        }

        info!("queue pass complete");
        Ok(())
    }

    /// Kill whatever download is running. Does nothing when idle.
    pub fn cancel_current_download(&self) -> bool {
        self.backend.cancel_current()
    }
}

/// Mark every still-pending job in `remaining` as cancelled.
fn abort(remaining: &[Arc<Job>]) -> DlqueueError {
    let mut cancelled = 0usize;
    for job in remaining {
        if job.transition(JobStatus::Queued, JobStatus::Cancelled)
            || job.transition(JobStatus::FetchingInfo, JobStatus::Cancelled)
        {
            cancelled += 1;
        }
    }
    info!(cancelled, "queue processing cancelled");
    DlqueueError::Cancelled
}
