// src/engine/metadata.rs

//! Background title lookup for freshly enqueued jobs.
//!
//! Lookups are fire-and-forget: enqueue never waits for them and a failed
//! lookup just leaves the URL as the display name.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::job::Job;
use crate::tools::Toolchain;
use crate::types::JobStatus;

/// Looks up a human-readable title for a URL.
pub trait TitleFetcher: Send + Sync {
    fn is_available(&self) -> bool;

    /// `None` on any failure.
    fn fetch<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

/// Asks the extraction tool for the title (`--get-title`).
#[derive(Debug)]
pub struct ToolTitleFetcher {
    toolchain: Arc<Toolchain>,
    timeout: Duration,
}

impl ToolTitleFetcher {
    pub fn new(toolchain: Arc<Toolchain>, timeout: Duration) -> Self {
        Self { toolchain, timeout }
    }

    async fn fetch_inner(&self, url: &str) -> Result<Option<String>> {
        let program = self
            .toolchain
            .extractor()
            .context("extraction tool not available")?;

        let child = Command::new(&program)
            .args(["--get-title", "--no-playlist", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("starting {}", program.display()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.context("waiting for title lookup")?,
            Err(_) => bail!("title lookup timed out after {:?}", self.timeout),
        };

        if !output.status.success() {
            debug!(url, status = %output.status, "title lookup failed");
            return Ok(None);
        }

        Ok(last_title_line(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl TitleFetcher for ToolTitleFetcher {
    fn is_available(&self) -> bool {
        self.toolchain.is_extractor_available()
    }

    fn fetch<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            match self.fetch_inner(url).await {
                Ok(title) => title,
                Err(err) => {
                    debug!(url, error = %format!("{err:#}"), "title lookup error");
                    None
                }
            }
        })
    }
}

/// Last non-empty line of the tool's output, trimmed.
pub fn last_title_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

/// Spawns title lookups and counts the ones in flight.
#[derive(Clone)]
pub struct TitlePrefetcher {
    fetcher: Arc<dyn TitleFetcher>,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for TitlePrefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitlePrefetcher")
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

impl TitlePrefetcher {
    pub fn new(fetcher: Arc<dyn TitleFetcher>) -> Self {
        Self {
            fetcher,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lookups currently in flight.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a lookup for `job` on the current tokio runtime.
    ///
    /// The job shows `FetchingInfo` while the lookup runs and goes back to
    /// `Queued` afterwards, unless something else changed its status in the
    /// meantime. Returns `None` when no lookup was started (no runtime, no
    /// tool, or the job is not `Queued`).
    pub fn spawn(&self, job: Arc<Job>) -> Option<JoinHandle<()>> {
        if !self.fetcher.is_available() {
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!(job = job.id(), "no async runtime; skipping title lookup");
            return None;
        };
        if !job.transition(JobStatus::Queued, JobStatus::FetchingInfo) {
            return None;
        }

        let guard = ActiveGuard::new(Arc::clone(&self.active));
        let fetcher = Arc::clone(&self.fetcher);

        Some(handle.spawn(async move {
            let _guard = guard;
            match fetcher.fetch(job.url()).await {
                Some(title) => {
                    trace!(job = job.id(), %title, "title fetched");
                    job.set_title(title);
                }
                None => debug!(job = job.id(), "no title; keeping url"),
            }
            job.transition(JobStatus::FetchingInfo, JobStatus::Queued);
        }))
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
