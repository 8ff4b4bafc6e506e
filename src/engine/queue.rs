// src/engine/queue.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::job::{Job, JobChange, JobEvent, JobNotifier};
use crate::types::{JobId, JobOptions, JobStatus};

use super::metadata::TitlePrefetcher;

/// What [`DownloadQueue::enqueue`] did with a request.
#[derive(Debug, Clone)]
pub enum Enqueued {
    /// A new job was appended.
    Added(Arc<Job>),
    /// A finished, cancelled or failed duplicate was replaced in place.
    Replaced { previous: Arc<Job>, job: Arc<Job> },
    /// An equivalent job is still pending or running.
    Skipped(Arc<Job>),
}

impl Enqueued {
    pub fn job(&self) -> &Arc<Job> {
        match self {
            Enqueued::Added(job) | Enqueued::Replaced { job, .. } | Enqueued::Skipped(job) => job,
        }
    }
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub total: usize,
    pub queued: usize,
    pub fetching_info: usize,
    pub downloading: usize,
    pub finished: usize,
    pub error: usize,
    pub cancelled: usize,
    pub failed: usize,
    /// `Error` jobs the next pass would retry.
    pub retryable: usize,
}

impl QueueSummary {
    /// Jobs that ended a pass without a file.
    pub fn incomplete(&self) -> usize {
        self.error + self.failed
    }
}

/// The ordered list of jobs.
///
/// Order is enqueue order; replacing a job keeps its position.
#[derive(Debug)]
pub struct DownloadQueue {
    jobs: Mutex<Vec<Arc<Job>>>,
    next_id: AtomicU64,
    notifier: JobNotifier,
    prefetch: Option<TitlePrefetcher>,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            notifier: JobNotifier::default(),
            prefetch: None,
        }
    }

    /// Look up titles in the background for every added job.
    pub fn with_title_prefetch(mut self, prefetch: TitlePrefetcher) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.notifier.subscribe()
    }

    /// Append a new `Queued` job.
    pub fn add(&self, url: impl Into<String>, options: JobOptions) -> Arc<Job> {
        let job = self.new_job(url.into(), options);
        self.lock().push(Arc::clone(&job));
        job.notify(JobChange::Added);
        debug!(job = job.id(), url = %job.url(), "job added");
        self.start_prefetch(&job);
        job
    }

    /// First job whose URL contains `key` and whose options equal `options`.
    pub fn find_duplicate(&self, key: &str, options: &JobOptions) -> Option<Arc<Job>> {
        self.lock()
            .iter()
            .find(|job| job.url().contains(key) && job.options() == options)
            .cloned()
    }

    /// Swap `existing` for a fresh job at the same position.
    ///
    /// Returns `None` if `existing` is no longer in the queue.
    pub fn replace(&self, existing: &Job, url: impl Into<String>, options: JobOptions) -> Option<Arc<Job>> {
        let job = {
            let mut jobs = self.lock();
            let slot = jobs.iter_mut().find(|job| job.id() == existing.id())?;
            let job = self.new_job(url.into(), options);
            *slot = Arc::clone(&job);
            job
        };
        existing.notify(JobChange::Removed);
        job.notify(JobChange::Added);
        debug!(previous = existing.id(), job = job.id(), "job replaced");
        self.start_prefetch(&job);
        Some(job)
    }

    /// Add `url` unless an equivalent job exists.
    ///
    /// A duplicate that is `Finished`, `Cancelled` or `Failed` is replaced in
    /// place; any other duplicate makes this a no-op. Lookup and insertion
    /// happen under one lock.
    pub fn enqueue(&self, url: impl Into<String>, key: &str, options: JobOptions) -> Enqueued {
        let url = url.into();
        let result = {
            let mut jobs = self.lock();
            let duplicate = jobs
                .iter()
                .position(|job| job.url().contains(key) && job.options() == &options);
            match duplicate {
                None => {
                    let job = self.new_job(url.clone(), options);
                    jobs.push(Arc::clone(&job));
                    Enqueued::Added(job)
                }
                Some(pos) if !jobs[pos].status().is_terminal() => {
                    Enqueued::Skipped(Arc::clone(&jobs[pos]))
                }
                Some(pos) => {
                    let job = self.new_job(url.clone(), options);
                    let previous = std::mem::replace(&mut jobs[pos], Arc::clone(&job));
                    Enqueued::Replaced { previous, job }
                }
            }
        };

        match &result {
            Enqueued::Added(job) => {
                job.notify(JobChange::Added);
                debug!(job = job.id(), %url, "job added");
                self.start_prefetch(job);
            }
            Enqueued::Replaced { previous, job } => {
                previous.notify(JobChange::Removed);
                job.notify(JobChange::Added);
                debug!(previous = previous.id(), job = job.id(), "job replaced");
                self.start_prefetch(job);
            }
            Enqueued::Skipped(existing) => {
                info!(job = existing.id(), status = %existing.status(), %url, "already queued; skipping");
            }
        }
        result
    }

    pub fn remove(&self, id: JobId) -> Option<Arc<Job>> {
        let job = {
            let mut jobs = self.lock();
            let pos = jobs.iter().position(|job| job.id() == id)?;
            jobs.remove(pos)
        };
        job.notify(JobChange::Removed);
        Some(job)
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.lock());
        for job in &removed {
            job.notify(JobChange::Removed);
        }
    }

    /// Current jobs in queue order.
    pub fn snapshot(&self) -> Vec<Arc<Job>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary::default();
        for job in self.lock().iter() {
            summary.total += 1;
            match job.status() {
                JobStatus::Queued => summary.queued += 1,
                JobStatus::FetchingInfo => summary.fetching_info += 1,
                JobStatus::Downloading => summary.downloading += 1,
                JobStatus::Finished => summary.finished += 1,
                JobStatus::Error => summary.error += 1,
                JobStatus::Cancelled => summary.cancelled += 1,
                JobStatus::Failed => summary.failed += 1,
            }
            if job.can_retry() {
                summary.retryable += 1;
            }
        }
        summary
    }

    /// Whether any background title lookup is still running.
    pub fn is_fetching_titles(&self) -> bool {
        self.prefetch.as_ref().is_some_and(|p| p.active() > 0)
    }

    fn new_job(&self, url: String, options: JobOptions) -> Arc<Job> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(Job::new(id, url, options, self.notifier.clone()))
    }

    fn start_prefetch(&self, job: &Arc<Job>) {
        if let Some(prefetch) = &self.prefetch {
            prefetch.spawn(Arc::clone(job));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
