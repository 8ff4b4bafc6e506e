// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod tools;
pub mod types;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_or_default};
use crate::engine::{
    DownloadQueue, Enqueued, QueueProcessor, QueueSummary, TitlePrefetcher, ToolTitleFetcher,
};
use crate::errors::{DlqueueError, Result};
use crate::exec::{DiagnosticLog, ProcessRunner};
use crate::job::{Job, JobChange, JobEvent};
use crate::tools::{EXTRACTOR_NAME, Toolchain};
use crate::types::{JobId, JobStatus};

/// Conventional exit status for a run interrupted by SIGINT.
pub const EXIT_CANCELLED: i32 = 130;

/// What the `n`th Ctrl-C of a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Cancel the batch and kill the running download.
    CancelBatch,
    /// Exit the process immediately with [`EXIT_CANCELLED`].
    ForceExit,
}

impl InterruptAction {
    pub fn for_signal(n: u32) -> Self {
        if n <= 1 {
            InterruptAction::CancelBatch
        } else {
            InterruptAction::ForceExit
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and tool detection
/// - the queue (with optional title prefetch)
/// - the processor and its process runner
/// - Ctrl-C handling
/// - repeated passes while jobs remain retryable
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => load_or_default(path, true)?,
        None => load_or_default(default_config_path(), false)?,
    };
    if let Some(dir) = &args.output_dir {
        cfg.download.output_dir = dir.clone();
    }

    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        return Err(DlqueueError::ConfigError(
            "no URLs given (pass them as arguments or with --input)".to_string(),
        ));
    }

    let toolchain = Arc::new(Toolchain::discover(&cfg.tools));
    let log = Arc::new(match &cfg.download.log_file {
        Some(path) => DiagnosticLog::new(path),
        None => DiagnosticLog::disabled(),
    });
    let runner = ProcessRunner::new(Arc::clone(&toolchain), cfg.download.runner_settings(), log);

    let mut queue = DownloadQueue::new();
    if cfg.metadata.enabled && !args.no_titles && !args.dry_run {
        let fetcher = ToolTitleFetcher::new(Arc::clone(&toolchain), cfg.metadata.timeout);
        queue = queue.with_title_prefetch(TitlePrefetcher::new(Arc::new(fetcher)));
    }
    let printer = spawn_event_printer(queue.subscribe());

    let options = args.job_options();
    for url in &urls {
        match queue.enqueue(url.as_str(), url, options.clone()) {
            Enqueued::Added(job) => debug!(job = job.id(), %url, "queued"),
            Enqueued::Replaced { previous, job } => {
                debug!(previous = previous.id(), job = job.id(), %url, "re-queued")
            }
            Enqueued::Skipped(job) => println!("skipping duplicate: {url} (job #{})", job.id()),
        }
    }

    if args.dry_run {
        printer.abort();
        print_dry_run(&cfg, &runner, &queue);
        return Ok(());
    }

    if !toolchain.is_extractor_available() {
        printer.abort();
        return Err(DlqueueError::ToolNotFound(EXTRACTOR_NAME.to_string()));
    }

    let processor = Arc::new(QueueProcessor::new(runner));
    let cancel = CancellationToken::new();

    // First Ctrl-C cancels the batch and kills the running download; a second
    // one exits immediately.
    {
        let cancel = cancel.clone();
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            let mut received = 0u32;
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                received += 1;
                match InterruptAction::for_signal(received) {
                    InterruptAction::CancelBatch => {
                        info!("Ctrl+C received; cancelling downloads (press again to force exit)");
                        cancel.cancel();
                        processor.cancel_current_download();
                    }
                    InterruptAction::ForceExit => {
                        warn!("second Ctrl+C received; exiting");
                        std::process::exit(EXIT_CANCELLED);
                    }
                }
            }
        });
    }

    let outcome = run_passes(
        &processor,
        &queue,
        &toolchain,
        &cancel,
        cfg.download.auto_retry,
    )
    .await;

    printer.abort();
    print_summary(&queue);

    let summary = outcome?;
    if summary.incomplete() > 0 {
        return Err(DlqueueError::DownloadsIncomplete {
            errors: summary.error,
            failed: summary.failed,
        });
    }
    Ok(())
}

/// Process the queue until no job is left to retry.
///
/// Tools are re-detected before every pass. Stops with `ToolNotFound` if the
/// extraction tool disappeared, with `Cancelled` once `cancel` fires, and
/// after any pass that changed no job.
async fn run_passes(
    processor: &QueueProcessor<ProcessRunner>,
    queue: &DownloadQueue,
    toolchain: &Toolchain,
    cancel: &CancellationToken,
    auto_retry: bool,
) -> Result<QueueSummary> {
    let mut pass = 1u32;
    loop {
        toolchain.refresh();
        if !cancel.is_cancelled() && !toolchain.is_extractor_available() {
            return Err(DlqueueError::ToolNotFound(EXTRACTOR_NAME.to_string()));
        }
        info!(pass, jobs = queue.len(), "starting pass");

        let jobs = queue.snapshot();
        let before = job_states(&jobs);
        processor.process_queue(&jobs, cancel).await?;

        let summary = queue.summary();
        if !(auto_retry && summary.error > 0) {
            return Ok(summary);
        }
        if job_states(&jobs) == before {
            warn!(pass, "pass changed no job; giving up on remaining errors");
            return Ok(summary);
        }
        pass += 1;
    }
}

fn job_states(jobs: &[Arc<Job>]) -> Vec<(JobStatus, u32)> {
    jobs.iter()
        .map(|job| (job.status(), job.retry_count()))
        .collect()
}

/// URLs from the command line followed by those from `--input`, trimmed,
/// blanks and `#` comments dropped.
fn collect_urls(args: &CliArgs) -> Result<Vec<String>> {
    let mut urls: Vec<String> = args
        .urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if let Some(path) = &args.input {
        urls.extend(read_url_file(path)?);
    }
    Ok(urls)
}

fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Print status changes and whole-percent progress to stdout.
fn spawn_event_printer(mut rx: broadcast::Receiver<JobEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_percent: HashMap<JobId, u32> = HashMap::new();
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event.change {
                JobChange::Status(status) if status != JobStatus::FetchingInfo => {
                    println!("job #{}: {status}", event.job);
                }
                JobChange::Title(title) => println!("job #{}: {title}", event.job),
                JobChange::ErrorMessage(Some(message)) => {
                    println!("job #{}: error: {message}", event.job);
                }
                JobChange::Progress(fraction) => {
                    let percent = (fraction * 100.0).floor() as u32;
                    if last_percent.insert(event.job, percent) != Some(percent) {
                        println!("job #{}: {percent}%", event.job);
                    }
                }
                _ => {}
            }
        }
    })
}

fn print_dry_run(cfg: &ConfigFile, runner: &ProcessRunner, queue: &DownloadQueue) {
    println!("dlqueue dry-run");
    println!("  output_dir = {}", cfg.download.output_dir.display());
    println!("  timeout = {:?}", cfg.download.timeout);
    match runner.toolchain().helper() {
        Some(helper) => println!("  ffmpeg = {}", helper.display()),
        None => println!("  ffmpeg = (not found)"),
    }
    println!();

    let jobs = queue.snapshot();
    println!("jobs ({}):", jobs.len());
    for job in jobs {
        println!("  #{} {}", job.id(), job.url());
        println!("      options: {}", job.options().summary());
        match runner.command_line(&job) {
            Some(cmd) => println!("      cmd: {cmd}"),
            None => println!("      cmd: ({EXTRACTOR_NAME} not found)"),
        }
    }
}

fn print_summary(queue: &DownloadQueue) {
    let summary: QueueSummary = queue.summary();
    println!();
    println!(
        "{} of {} finished, {} can be retried, {} permanently failed, {} cancelled",
        summary.finished, summary.total, summary.error, summary.failed, summary.cancelled
    );
    for job in queue.snapshot() {
        if let Some(message) = job.error_message() {
            println!("  {} [{}]: {message}", job.display_name(), job.status());
        }
    }
}
