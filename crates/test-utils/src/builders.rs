#![allow(dead_code)]

use std::sync::Arc;

use dlqueue::config::{ConfigFile, RawConfigFile};
use dlqueue::exec::Outcome;
use dlqueue::job::{Job, JobNotifier};
use dlqueue::types::{JobId, JobOptions, JobStatus};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.download.output_dir = dir.to_string();
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.download.timeout = timeout.to_string();
        self
    }

    pub fn subtitle_lang(mut self, lang: &str) -> Self {
        self.config.download.subtitle_lang = lang.to_string();
        self
    }

    pub fn log_file(mut self, path: &str) -> Self {
        self.config.download.log_file = path.to_string();
        self
    }

    pub fn auto_retry(mut self, val: bool) -> Self {
        self.config.download.auto_retry = val;
        self
    }

    pub fn metadata(mut self, enabled: bool, timeout: &str) -> Self {
        self.config.metadata.enabled = enabled;
        self.config.metadata.timeout = timeout.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `Job` in an arbitrary lifecycle state.
///
/// Only the public job API is used, so the built job went through the same
/// transitions a real one would.
pub struct JobBuilder {
    id: JobId,
    url: String,
    options: JobOptions,
    status: JobStatus,
    error: Option<String>,
    retries: u32,
    title: Option<String>,
    notifier: JobNotifier,
}

impl JobBuilder {
    pub fn new(id: JobId, url: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
            options: JobOptions::default(),
            status: JobStatus::Queued,
            error: None,
            retries: 0,
            title: None,
            notifier: JobNotifier::default(),
        }
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn preset(mut self, preset: &str) -> Self {
        self.options.preset = preset.to_string();
        self
    }

    pub fn playlist(mut self, val: bool) -> Self {
        self.options.playlist = val;
        self
    }

    pub fn subtitles(mut self, val: bool) -> Self {
        self.options.subtitles = val;
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// `Error` with `message` after `retries` retries.
    pub fn errored(mut self, message: &str, retries: u32) -> Self {
        self.status = JobStatus::Error;
        self.error = Some(message.to_string());
        self.retries = retries;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn notifier(mut self, notifier: JobNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// `Failed` jobs are built with at least `MAX_RETRIES` retries.
    pub fn build(self) -> Arc<Job> {
        let job = Job::new(self.id, self.url, self.options, self.notifier);
        let retries = match self.status {
            JobStatus::Failed => self.retries.max(Job::MAX_RETRIES),
            _ => self.retries,
        };
        for _ in 0..retries {
            job.increment_retry();
        }
        if let Some(title) = self.title {
            job.set_title(title);
        }
        let message = self.error.unwrap_or_else(|| "download failed".to_string());
        match self.status {
            JobStatus::Queued => {}
            JobStatus::FetchingInfo => {
                job.transition(JobStatus::Queued, JobStatus::FetchingInfo);
            }
            JobStatus::Downloading => job.begin_attempt(),
            JobStatus::Finished => job.apply_outcome(&Outcome::Finished),
            JobStatus::Cancelled => job.apply_outcome(&Outcome::Cancelled),
            JobStatus::Error => job.mark_error(message),
            JobStatus::Failed => {
                job.mark_error(message);
                job.mark_failed();
            }
        }
        Arc::new(job)
    }
}

/// Plain queued jobs with ids starting at 1, one per URL.
pub fn queued_jobs(urls: &[&str]) -> Vec<Arc<Job>> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| JobBuilder::new(i as JobId + 1, url).build())
        .collect()
}
