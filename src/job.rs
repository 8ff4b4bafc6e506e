// src/job.rs

//! The job record: one queued download, its fixed options and its live state.
//!
//! A [`Job`] is shared (`Arc<Job>`) between the queue that owns it, the queue
//! processor driving it, the process runner updating its progress, and the
//! title prefetch task. Its mutable state sits behind a short-lived mutex and
//! every effective change is published on a broadcast channel so observers
//! (a UI, the CLI printer) never need to poll.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::exec::Outcome;
use crate::types::{JobId, JobOptions, JobStatus};

/// Progress updates closer than this to the current value are dropped.
const PROGRESS_TOLERANCE: f64 = 0.0001;

/// Default capacity of the change-event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What changed on a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobChange {
    /// Job entered a queue.
    Added,
    /// Job was removed from (or replaced in) its queue.
    Removed,
    Status(JobStatus),
    Progress(f64),
    ErrorMessage(Option<String>),
    Title(String),
    RetryCount(u32),
}

/// Change notification for a single job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job: JobId,
    pub change: JobChange,
}

/// Publisher side of the job change channel.
///
/// Cloning is cheap; all clones feed the same subscribers. Sending with no
/// subscriber attached is not an error.
#[derive(Debug, Clone)]
pub struct JobNotifier {
    tx: broadcast::Sender<JobEvent>,
}

impl JobNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, job: JobId, change: JobChange) {
        // Err only means nobody is listening right now.
        let _ = self.tx.send(JobEvent { job, change });
    }
}

impl Default for JobNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[derive(Debug, Default)]
struct JobState {
    status: JobStatus,
    title: Option<String>,
    progress: f64,
    error_message: Option<String>,
    retry_count: u32,
}

/// A single download request and its live state.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    url: String,
    options: JobOptions,
    state: Mutex<JobState>,
    notifier: JobNotifier,
}

impl Job {
    /// Automatic retries allowed before a job is marked `Failed`.
    pub const MAX_RETRIES: u32 = 3;

    /// Create a fresh job: `Queued`, no progress, no retries.
    pub fn new(id: JobId, url: impl Into<String>, options: JobOptions, notifier: JobNotifier) -> Self {
        Self {
            id,
            url: url.into(),
            options,
            state: Mutex::new(JobState::default()),
            notifier,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    pub fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }

    /// Title if one was fetched, otherwise the URL.
    pub fn display_name(&self) -> String {
        match self.lock().title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.url.clone(),
        }
    }

    /// Whether the next processing pass will retry this job.
    pub fn can_retry(&self) -> bool {
        let state = self.lock();
        state.status == JobStatus::Error && state.retry_count < Self::MAX_RETRIES
    }

    /// Move to `status`.
    ///
    /// Entering a state that cannot carry an error message clears it.
    pub(crate) fn set_status(&self, status: JobStatus) {
        let mut changes = Vec::new();
        {
            let mut state = self.lock();
            if state.status != status {
                state.status = status;
                changes.push(JobChange::Status(status));
            }
            if !status.allows_error_message() && state.error_message.take().is_some() {
                changes.push(JobChange::ErrorMessage(None));
            }
        }
        self.publish(changes);
    }

    /// Move from `expected` to `next` only if the job is still in `expected`.
    ///
    /// Returns whether the transition happened.
    /// `Failed` is only reachable through [`Job::mark_failed`].
    pub fn transition(&self, expected: JobStatus, next: JobStatus) -> bool {
        if next == JobStatus::Failed && expected != JobStatus::Failed {
            return false;
        }
        {
            let mut state = self.lock();
            if state.status != expected {
                return false;
            }
            state.status = next;
        }
        if expected != next {
            self.notifier.notify(self.id, JobChange::Status(next));
        }
        true
    }

    /// Start a download attempt: `Downloading`, progress reset, previous
    /// error cleared.
    pub fn begin_attempt(&self) {
        let mut changes = Vec::new();
        {
            let mut state = self.lock();
            if state.status != JobStatus::Downloading {
                state.status = JobStatus::Downloading;
                changes.push(JobChange::Status(JobStatus::Downloading));
            }
            if state.error_message.take().is_some() {
                changes.push(JobChange::ErrorMessage(None));
            }
            if state.progress != 0.0 {
                state.progress = 0.0;
                changes.push(JobChange::Progress(0.0));
            }
        }
        self.publish(changes);
    }

    /// Record download progress as a fraction in `[0, 1]`.
    ///
    /// Ignored unless the job is `Downloading`. Values are clamped to the
    /// unit interval; tiny changes are not published.
    pub fn set_progress(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let mut state = self.lock();
            if state.status != JobStatus::Downloading {
                debug!(job = self.id, fraction, "progress outside of a download; ignoring");
                return;
            }
            if (state.progress - fraction).abs() < PROGRESS_TOLERANCE {
                return;
            }
            state.progress = fraction;
        }
        self.notifier.notify(self.id, JobChange::Progress(fraction));
    }

    /// Mark the job `Error` with the given message.
    pub fn mark_error(&self, message: impl Into<String>) {
        let message = message.into();
        let mut changes = Vec::new();
        {
            let mut state = self.lock();
            if state.status != JobStatus::Error {
                state.status = JobStatus::Error;
                changes.push(JobChange::Status(JobStatus::Error));
            }
            if state.error_message.as_deref() != Some(message.as_str()) {
                state.error_message = Some(message.clone());
                changes.push(JobChange::ErrorMessage(Some(message)));
            }
        }
        self.publish(changes);
    }

    /// Give up on an `Error` job whose retries are exhausted.
    ///
    /// Returns `false` and leaves the job alone unless it is `Error` with
    /// `retry_count >= MAX_RETRIES`. The error message is kept.
    pub fn mark_failed(&self) -> bool {
        {
            let mut state = self.lock();
            if state.status != JobStatus::Error || state.retry_count < Self::MAX_RETRIES {
                return false;
            }
            state.status = JobStatus::Failed;
        }
        self.notifier.notify(self.id, JobChange::Status(JobStatus::Failed));
        true
    }

    /// Bump the retry counter, saturating at [`Job::MAX_RETRIES`].
    pub fn increment_retry(&self) -> u32 {
        let count = {
            let mut state = self.lock();
            if state.retry_count >= Self::MAX_RETRIES {
                return state.retry_count;
            }
            state.retry_count += 1;
            state.retry_count
        };
        self.notifier.notify(self.id, JobChange::RetryCount(count));
        count
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        {
            let mut state = self.lock();
            if state.title.as_deref() == Some(title.as_str()) {
                return;
            }
            state.title = Some(title.clone());
        }
        self.notifier.notify(self.id, JobChange::Title(title));
    }

    /// Record the result of one download attempt.
    pub fn apply_outcome(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Finished => self.set_status(JobStatus::Finished),
            Outcome::Error(message) | Outcome::TimedOut(message) => self.mark_error(message.as_str()),
            Outcome::Cancelled => self.set_status(JobStatus::Cancelled),
        }
    }

    pub(crate) fn notify(&self, change: JobChange) {
        self.notifier.notify(self.id, change);
    }

    fn publish(&self, changes: Vec<JobChange>) {
        for change in changes {
            self.notifier.notify(self.id, change);
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
