use std::fmt;

/// Identifier assigned to a job by the queue that owns it.
pub type JobId = u64;

/// Lifecycle state of a queued download.
///
/// `Finished`, `Cancelled` and `Failed` are terminal: the queue processor
/// never picks such a job up again. `FetchingInfo` is a transient flavour of
/// `Queued` used while the title prefetch is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    FetchingInfo,
    Downloading,
    Finished,
    Error,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    /// Not started yet in this pass; these are the jobs an aborted batch
    /// marks `Cancelled`.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::FetchingInfo)
    }

    /// Whether a job in this state may carry an error message.
    pub fn allows_error_message(self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::FetchingInfo => "Fetching info...",
            JobStatus::Downloading => "Downloading",
            JobStatus::Finished => "Finished",
            JobStatus::Error => "Error",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Failed => "Failed",
        }
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Queued
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job download options. Fixed for the lifetime of a job; changing them
/// means replacing the job in the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JobOptions {
    /// Download the whole playlist instead of a single entry.
    pub playlist: bool,
    /// Fetch uploaded and auto-generated subtitles.
    pub subtitles: bool,
    /// Named output preset (e.g. `mp4`); empty means the tool's default.
    pub preset: String,
}

impl JobOptions {
    pub fn new(preset: impl Into<String>, playlist: bool, subtitles: bool) -> Self {
        Self {
            playlist,
            subtitles,
            preset: preset.into(),
        }
    }

    pub fn has_preset(&self) -> bool {
        !self.preset.is_empty()
    }

    /// Human-friendly preset label: `Default` or the upper-cased preset.
    pub fn preset_display(&self) -> String {
        if self.preset.is_empty() {
            "Default".to_string()
        } else {
            self.preset.to_uppercase()
        }
    }

    /// Short description of the boolean options, e.g. `Playlist, Subtitles`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.playlist {
            parts.push("Playlist");
        }
        if self.subtitles {
            parts.push("Subtitles");
        }
        if parts.is_empty() {
            "No extra options".to_string()
        } else {
            parts.join(", ")
        }
    }
}
