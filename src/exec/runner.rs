// src/exec/runner.rs

//! Runs the extraction tool for a single job.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::job::Job;
use crate::tools::Toolchain;

use super::args::{ArgContext, build_args, display_command};
use super::classify::classify_failure;
use super::diag_log::{DiagnosticLog, LogLevel};
use super::process::{ProcessSlot, isolate_process_tree, kill_tree};
use super::progress::parse_progress_line;
use super::{Outcome, UNEXPECTED_ERROR_PREFIX};

/// Absolute limit for a single download attempt.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default subtitle language.
pub const DEFAULT_SUBTITLE_LANG: &str = "en";

/// Per-runner settings that apply to every job.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Directory downloads are written to. Created on demand.
    pub output_dir: PathBuf,
    /// Language passed to `--sub-lang`.
    pub subtitle_lang: String,
    /// Deadline for one attempt, started when the attempt begins.
    pub timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            subtitle_lang: DEFAULT_SUBTITLE_LANG.to_string(),
            timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

/// Why the wait for the process ended.
enum Interrupt {
    Cancelled,
    TimedOut,
    Exited(Result<((), String, ExitStatus)>),
}

/// Production download backend: one external process per attempt.
#[derive(Debug)]
pub struct ProcessRunner {
    toolchain: Arc<Toolchain>,
    settings: RunnerSettings,
    log: Arc<DiagnosticLog>,
    slot: Arc<ProcessSlot>,
}

impl ProcessRunner {
    pub fn new(toolchain: Arc<Toolchain>, settings: RunnerSettings, log: Arc<DiagnosticLog>) -> Self {
        Self {
            toolchain,
            settings,
            log,
            slot: Arc::new(ProcessSlot::new()),
        }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// The slot holding the currently running process.
    pub fn slot(&self) -> &ProcessSlot {
        &self.slot
    }

    /// Arguments the tool would be invoked with for `job`.
    pub fn args_for(&self, job: &Job) -> Vec<OsString> {
        let helper = self.toolchain.helper();
        let ctx = ArgContext {
            output_dir: &self.settings.output_dir,
            subtitle_lang: &self.settings.subtitle_lang,
            helper: helper.as_deref(),
        };
        build_args(job, &ctx)
    }

    /// Full command line for `job`, or `None` without an extraction tool.
    pub fn command_line(&self, job: &Job) -> Option<String> {
        let program = self.toolchain.extractor()?;
        Some(display_command(&program, &self.args_for(job)))
    }

    /// Run one attempt for `job` with the located extraction tool.
    pub async fn run(&self, job: &Job, cancel: &CancellationToken) -> Outcome {
        let Some(program) = self.toolchain.extractor() else {
            let message = format!("{UNEXPECTED_ERROR_PREFIX}extraction tool not available");
            self.log.error(format!("Download error for {}: {message}", job.url()));
            return Outcome::Error(message);
        };
        let args = self.args_for(job);
        self.run_with(job, &program, args, cancel).await
    }

    /// Run `program args` for `job` until it exits, the deadline elapses or
    /// `cancel` fires.
    ///
    /// Never fails: errors that are not the tool's fault (spawn failure,
    /// unreadable output, an unrecognised progress format) become
    /// `Outcome::Error` with the "Unexpected error" prefix and are logged in
    /// full.
    pub async fn run_with(
        &self,
        job: &Job,
        program: &Path,
        args: Vec<OsString>,
        cancel: &CancellationToken,
    ) -> Outcome {
        self.log.info(format!("Starting download for: {}", job.url()));
        self.log.info(format!("Command: {}", display_command(program, &args)));

        match self.run_inner(job, program, args, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    job = job.id(),
                    url = %job.url(),
                    error = ?err,
                    "unexpected download error"
                );
                self.log
                    .error(format!("Unexpected error for {}: {err:?}", job.url()));
                Outcome::Error(format!("{UNEXPECTED_ERROR_PREFIX}{err:#}"))
            }
        }
    }

    async fn run_inner(
        &self,
        job: &Job,
        program: &Path,
        args: Vec<OsString>,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .with_context(|| {
                format!(
                    "creating output directory {}",
                    self.settings.output_dir.display()
                )
            })?;

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_process_tree(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("starting {}", program.display()))?;
        let pid = child
            .id()
            .context("download process exited before its pid could be read")?;
        let _registration = self.slot.register(job.id(), pid);

        job.begin_attempt();
        info!(job = job.id(), pid, url = %job.url(), "download started");

        let stdout = child.stdout.take().context("stdout was not captured")?;
        let stderr = child.stderr.take().context("stderr was not captured")?;

        let interrupt = {
            let streams = async {
                tokio::try_join!(
                    self.track_progress(job, stdout),
                    self.collect_stderr(job, stderr),
                    async {
                        child
                            .wait()
                            .await
                            .context("waiting for download process")
                    },
                )
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Interrupt::Cancelled,
                _ = tokio::time::sleep(self.settings.timeout) => Interrupt::TimedOut,
                res = streams => Interrupt::Exited(res),
            }
        };

        match interrupt {
            Interrupt::Exited(Ok(((), stderr_text, status))) => {
                let code = status.code().unwrap_or(-1);
                self.log.info(format!("Process exited with code: {code}"));
                info!(
                    job = job.id(),
                    exit_code = code,
                    success = status.success(),
                    "download process exited"
                );

                if status.success() {
                    self.log.info(format!("Download finished: {}", job.url()));
                    return Ok(Outcome::Finished);
                }

                // The kill from a cancellation can land just before the
                // select observes the token.
                if cancel.is_cancelled() {
                    self.log.info(format!("Cancelled: {}", job.url()));
                    return Ok(Outcome::Cancelled);
                }

                let message = classify_failure(&stderr_text, code);
                self.log
                    .error(format!("Download error for {}: {message}", job.url()));
                Ok(Outcome::Error(message))
            }
            Interrupt::Exited(Err(err)) => {
                terminate(&mut child, pid, job).await;
                Err(err)
            }
            Interrupt::Cancelled => {
                info!(job = job.id(), pid, "cancellation requested; killing download");
                terminate(&mut child, pid, job).await;
                self.log.info(format!("Cancelled: {}", job.url()));
                Ok(Outcome::Cancelled)
            }
            Interrupt::TimedOut => {
                warn!(
                    job = job.id(),
                    pid,
                    timeout_secs = self.settings.timeout.as_secs(),
                    "download timed out; killing process"
                );
                terminate(&mut child, pid, job).await;
                self.log.error(format!("Timeout: {}", job.url()));
                Ok(Outcome::TimedOut(timeout_message(self.settings.timeout)))
            }
        }
    }

    /// Read stdout to EOF, feeding recognised progress into the job.
    async fn track_progress(&self, job: &Job, stdout: ChildStdout) -> Result<()> {
        let mut lines = LineReader::new(stdout);
        while let Some(line) = lines.next_line().await.context("reading tool stdout")? {
            self.log.write(LogLevel::Stdout, &line);
            trace!(job = job.id(), "stdout: {}", line);

            if let Some(fraction) = parse_progress_line(&line)? {
                job.set_progress(fraction);
            }
        }
        debug!(job = job.id(), "stdout closed");
        Ok(())
    }

    /// Read stderr to EOF and return it for post-mortem classification.
    async fn collect_stderr(&self, job: &Job, stderr: ChildStderr) -> Result<String> {
        let mut lines = LineReader::new(stderr);
        let mut buffer = String::new();
        while let Some(line) = lines.next_line().await.context("reading tool stderr")? {
            self.log.write(LogLevel::Stderr, &line);
            debug!(job = job.id(), "stderr: {}", line);
            buffer.push_str(&line);
            buffer.push('\n');
        }
        Ok(buffer)
    }
}

/// Kill the process tree and reap the child.
async fn terminate(child: &mut Child, pid: u32, job: &Job) {
    if let Err(e) = kill_tree(pid) {
        warn!(job = job.id(), pid, error = %e, "failed to kill download process tree");
    }
    if let Err(e) = child.kill().await {
        debug!(job = job.id(), pid, error = %e, "child already gone while killing");
    }
}

/// Line reader tolerant of invalid UTF-8 and CRLF endings.
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

/// User-facing message for an attempt that hit its deadline, e.g.
/// `Download timed out after 30 minutes`.
pub fn timeout_message(timeout: Duration) -> String {
    format!("Download timed out after {}", describe_duration(timeout))
}

fn describe_duration(d: Duration) -> String {
    fn plural(n: u128, unit: &str) -> String {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    }

    let millis = d.as_millis();
    if millis == 0 || millis % 1000 != 0 {
        return plural(millis, "millisecond");
    }
    let secs = millis / 1000;
    if secs % 3600 == 0 {
        plural(secs / 3600, "hour")
    } else if secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else {
        plural(secs, "second")
    }
}
