// src/exec/process.rs

//! The "current process" slot shared between the runner and external cancel
//! requests, plus platform helpers for killing a whole process tree.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::types::JobId;

/// The process currently running a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningProcess {
    pub job: JobId,
    pub pid: u32,
}

/// Holds at most one [`RunningProcess`].
///
/// The runner registers its child here for the lifetime of the attempt; a
/// cancel request coming from outside the processing loop (Ctrl-C, a UI
/// button) takes the same lock, so it never races with registration or
/// release.
#[derive(Debug, Default)]
pub struct ProcessSlot {
    current: Mutex<Option<RunningProcess>>,
}

impl ProcessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pid` as the current process. The slot is released when the
    /// returned guard is dropped.
    pub fn register(&self, job: JobId, pid: u32) -> SlotGuard<'_> {
        let mut current = self.lock();
        if let Some(previous) = current.replace(RunningProcess { job, pid }) {
            warn!(
                job,
                pid,
                previous_job = previous.job,
                previous_pid = previous.pid,
                "replacing a still-registered process"
            );
        }
        SlotGuard { slot: self, pid }
    }

    pub fn current(&self) -> Option<RunningProcess> {
        *self.lock()
    }

    /// Kill the current process tree, if any.
    ///
    /// Returns `true` if a process was signalled. Calling this with nothing
    /// running does nothing.
    pub fn kill_current(&self) -> bool {
        let current = self.lock();
        let Some(running) = *current else {
            debug!("cancel requested but no download is running");
            return false;
        };

        info!(job = running.job, pid = running.pid, "killing current download process tree");
        if let Err(e) = kill_tree(running.pid) {
            warn!(
                job = running.job,
                pid = running.pid,
                error = %e,
                "failed to kill download process tree"
            );
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningProcess>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the slot on drop, unless another process was registered since.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a ProcessSlot,
    pid: u32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.slot.lock();
        if current.map(|p| p.pid) == Some(self.pid) {
            *current = None;
        }
    }
}

/// Spawn the child as the leader of its own process group (unix) / without a
/// console window (windows), so the whole tree can be killed at once.
pub fn isolate_process_tree(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Forcefully kill `pid` and everything it spawned.
///
/// A process that is already gone is not an error.
#[cfg(unix)]
pub fn kill_tree(pid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: killpg only sends a signal; it has no memory-safety
    // preconditions. The group id is the one created by `isolate_process_tree`.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Forcefully kill `pid` and everything it spawned.
#[cfg(not(unix))]
pub fn kill_tree(pid: u32) -> io::Result<()> {
    use std::process::Stdio;

    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "taskkill exited with {status} for pid {pid}"
        )))
    }
}
