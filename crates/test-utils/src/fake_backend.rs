use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use dlqueue::exec::{DownloadBackend, Outcome};
use dlqueue::job::Job;

/// What one scripted attempt does.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Report the given progress values, then finish.
    Succeed(Vec<f64>),
    /// Fail with this message.
    Fail(String),
    /// Hit the deadline with this message.
    TimeOut(String),
    /// Block until the cancel token fires (→ `Cancelled`) or
    /// `cancel_current` kills it (→ `Error`).
    Hang,
}

/// A fake backend that:
/// - records the URL of every attempt
/// - plays back scripted steps per URL (default: succeed)
/// - supports cancellation like the real runner
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    invocations: Arc<Mutex<Vec<String>>>,
    unavailable: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    kill: Arc<Notify>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `steps` for successive attempts of `url`.
    pub fn script(self, url: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn unavailable(self) -> Self {
        self.unavailable.store(true, Ordering::SeqCst);
        self
    }

    /// URLs attempted so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, url: &str) -> usize {
        self.invocations().iter().filter(|u| *u == url).count()
    }

    fn next_step(&self, url: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Succeed(Vec::new()))
    }
}

impl DownloadBackend for ScriptedBackend {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn run<'a>(
        &'a self,
        job: &'a Job,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(job.url().to_string());
            let step = self.next_step(job.url());

            self.running.store(true, Ordering::SeqCst);
            job.begin_attempt();

            let outcome = match step {
                Step::Succeed(progress) => {
                    for p in progress {
                        job.set_progress(p);
                    }
                    Outcome::Finished
                }
                Step::Fail(message) => Outcome::Error(message),
                Step::TimeOut(message) => Outcome::TimedOut(message),
                Step::Hang => {
                    tokio::select! {
                        _ = cancel.cancelled() => Outcome::Cancelled,
                        _ = self.kill.notified() => {
                            if cancel.is_cancelled() {
                                Outcome::Cancelled
                            } else {
                                Outcome::Error("Download failed (exit code -1)".to_string())
                            }
                        }
                    }
                }
            };

            self.running.store(false, Ordering::SeqCst);
            outcome
        })
    }

    fn cancel_current(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.kill.notify_one();
        true
    }
}
