// tests/processor_scenarios.rs

use std::error::Error;
use std::sync::Arc;

use dlqueue::engine::QueueProcessor;
use dlqueue::errors::DlqueueError;
use dlqueue::job::{Job, JobChange, JobNotifier};
use dlqueue::types::JobStatus;
use dlqueue_test_utils::builders::{JobBuilder, queued_jobs};
use dlqueue_test_utils::fake_backend::{ScriptedBackend, Step};
use dlqueue_test_utils::{init_tracing, with_timeout};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn Error>>;

const A: &str = "https://example.com/a";
const B: &str = "https://example.com/b";
const C: &str = "https://example.com/c";

#[tokio::test]
async fn failing_job_is_absorbed_and_retried_on_next_pass() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new().script(
        B,
        [
            Step::Fail("Video not found (404)".into()),
            Step::Fail("Video not found (404)".into()),
        ],
    );
    let processor = QueueProcessor::new(backend.clone());
    let jobs = queued_jobs(&[A, B, C]);
    let cancel = CancellationToken::new();

    with_timeout(processor.process_queue(&jobs, &cancel)).await?;

    assert_eq!(jobs[0].status(), JobStatus::Finished);
    assert_eq!(jobs[1].status(), JobStatus::Error);
    assert_eq!(jobs[1].retry_count(), 0);
    assert_eq!(jobs[2].status(), JobStatus::Finished);

    with_timeout(processor.process_queue(&jobs, &cancel)).await?;

    assert_eq!(jobs[0].status(), JobStatus::Finished);
    assert_eq!(jobs[1].status(), JobStatus::Error);
    assert_eq!(jobs[1].error_message().as_deref(), Some("Video not found (404)"));
    assert_eq!(jobs[1].retry_count(), 1);
    assert_eq!(jobs[2].status(), JobStatus::Finished);

    // Finished jobs are never re-run.
    assert_eq!(backend.invocations(), vec![A, B, C, B]);
    Ok(())
}

#[tokio::test]
async fn exhausted_job_becomes_failed_without_running() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new();
    let processor = QueueProcessor::new(backend.clone());
    let job = JobBuilder::new(1, A)
        .errored("Network error - check your internet connection", Job::MAX_RETRIES)
        .build();

    with_timeout(processor.process_queue(&[Arc::clone(&job)], &CancellationToken::new())).await?;

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(
        job.error_message().as_deref(),
        Some("Network error - check your internet connection")
    );
    assert!(backend.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn terminal_jobs_are_skipped() -> TestResult {
    let backend = ScriptedBackend::new();
    let processor = QueueProcessor::new(backend.clone());
    let jobs = vec![
        JobBuilder::new(1, A).status(JobStatus::Finished).build(),
        JobBuilder::new(2, B).status(JobStatus::Cancelled).build(),
        JobBuilder::new(3, C).status(JobStatus::Failed).build(),
    ];

    with_timeout(processor.process_queue(&jobs, &CancellationToken::new())).await?;

    assert!(backend.invocations().is_empty());
    assert_eq!(jobs[1].status(), JobStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn fetching_and_stale_downloading_jobs_are_run() -> TestResult {
    let backend = ScriptedBackend::new();
    let processor = QueueProcessor::new(backend.clone());
    let jobs = vec![
        JobBuilder::new(1, A).status(JobStatus::FetchingInfo).build(),
        JobBuilder::new(2, B).status(JobStatus::Downloading).build(),
    ];

    with_timeout(processor.process_queue(&jobs, &CancellationToken::new())).await?;

    assert_eq!(backend.invocations(), vec![A, B]);
    assert!(jobs.iter().all(|j| j.status() == JobStatus::Finished));
    Ok(())
}

#[tokio::test]
async fn timeout_counts_as_error() -> TestResult {
    let backend = ScriptedBackend::new()
        .script(A, [Step::TimeOut("Download timed out after 30 minutes".into())]);
    let processor = QueueProcessor::new(backend);
    let jobs = queued_jobs(&[A]);

    with_timeout(processor.process_queue(&jobs, &CancellationToken::new())).await?;

    assert_eq!(jobs[0].status(), JobStatus::Error);
    assert_eq!(
        jobs[0].error_message().as_deref(),
        Some("Download timed out after 30 minutes")
    );
    Ok(())
}

#[tokio::test]
async fn progress_reaches_the_job() -> TestResult {
    let backend = ScriptedBackend::new().script(A, [Step::Succeed(vec![0.1, 0.5, 1.0])]);
    let processor = QueueProcessor::new(backend);
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let job = JobBuilder::new(1, A).notifier(notifier).build();

    with_timeout(processor.process_queue(&[Arc::clone(&job)], &CancellationToken::new())).await?;

    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let JobChange::Progress(p) = event.change {
            progress.push(p);
        }
    }
    assert_eq!(progress, vec![0.1, 0.5, 1.0]);
    assert_eq!(job.status(), JobStatus::Finished);
    Ok(())
}

#[tokio::test]
async fn cancelling_mid_download_cancels_the_rest() -> TestResult {
    init_tracing();

    let backend = ScriptedBackend::new().script(B, [Step::Hang]);
    let processor = Arc::new(QueueProcessor::new(backend.clone()));
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let jobs: Vec<Arc<Job>> = [A, B, C]
        .iter()
        .enumerate()
        .map(|(i, url)| JobBuilder::new(i as u64 + 1, url).notifier(notifier.clone()).build())
        .collect();
    let cancel = CancellationToken::new();

    let run = {
        let processor = Arc::clone(&processor);
        let jobs = jobs.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { processor.process_queue(&jobs, &cancel).await })
    };

    // Wait until B is downloading, then cancel like Ctrl-C does.
    with_timeout(async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if event.job == 2 && event.change == JobChange::Status(JobStatus::Downloading) {
                break;
            }
        }
    })
    .await;
    cancel.cancel();
    processor.cancel_current_download();

    let result = with_timeout(run).await?;
    assert!(matches!(result, Err(DlqueueError::Cancelled)));

    assert_eq!(jobs[0].status(), JobStatus::Finished);
    assert_eq!(jobs[1].status(), JobStatus::Cancelled);
    assert_eq!(jobs[2].status(), JobStatus::Cancelled);
    assert_eq!(backend.invocations(), vec![A, B]);
    Ok(())
}

#[tokio::test]
async fn cancel_between_jobs_marks_all_pending() -> TestResult {
    let backend = ScriptedBackend::new();
    let processor = QueueProcessor::new(backend.clone());
    let jobs = vec![
        JobBuilder::new(1, A).status(JobStatus::Finished).build(),
        JobBuilder::new(2, B).build(),
        JobBuilder::new(3, C).errored("x", 1).build(),
    ];
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = with_timeout(processor.process_queue(&jobs, &cancel)).await;

    assert!(matches!(result, Err(DlqueueError::Cancelled)));
    assert_eq!(jobs[0].status(), JobStatus::Finished);
    assert_eq!(jobs[1].status(), JobStatus::Cancelled);
    // Only pending jobs are cancelled.
    assert_eq!(jobs[2].status(), JobStatus::Error);
    assert!(backend.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn killing_current_download_without_cancel_is_an_error() -> TestResult {
    let backend = ScriptedBackend::new().script(A, [Step::Hang]);
    let processor = Arc::new(QueueProcessor::new(backend));
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let jobs = vec![
        JobBuilder::new(1, A).notifier(notifier.clone()).build(),
        JobBuilder::new(2, B).notifier(notifier).build(),
    ];

    let run = {
        let processor = Arc::clone(&processor);
        let jobs = jobs.clone();
        tokio::spawn(async move { processor.process_queue(&jobs, &CancellationToken::new()).await })
    };

    with_timeout(async {
        while rx.recv().await.expect("event channel open").change
            != JobChange::Status(JobStatus::Downloading)
        {}
    })
    .await;
    assert!(processor.cancel_current_download());

    with_timeout(run).await??;
    assert_eq!(jobs[0].status(), JobStatus::Error);
    assert_eq!(jobs[1].status(), JobStatus::Finished);
    Ok(())
}

#[tokio::test]
async fn cancel_current_download_when_idle_is_a_no_op() -> TestResult {
    let processor = QueueProcessor::new(ScriptedBackend::new());
    let jobs = queued_jobs(&[A]);

    assert!(!processor.cancel_current_download());
    assert!(!processor.cancel_current_download());
    assert_eq!(jobs[0].status(), JobStatus::Queued);

    with_timeout(processor.process_queue(&jobs, &CancellationToken::new())).await?;
    assert_eq!(jobs[0].status(), JobStatus::Finished);
    Ok(())
}

#[tokio::test]
async fn unavailable_backend_does_nothing() -> TestResult {
    let backend = ScriptedBackend::new().unavailable();
    let processor = QueueProcessor::new(backend.clone());
    let jobs = queued_jobs(&[A, B]);

    with_timeout(processor.process_queue(&jobs, &CancellationToken::new())).await?;

    assert!(backend.invocations().is_empty());
    assert!(jobs.iter().all(|j| j.status() == JobStatus::Queued));
    Ok(())
}

#[tokio::test]
async fn cancelled_token_aborts_even_without_a_backend() -> TestResult {
    let backend = ScriptedBackend::new().unavailable();
    let processor = QueueProcessor::new(backend.clone());
    let jobs = queued_jobs(&[A, B]);
    jobs[1].mark_error("boom");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = with_timeout(processor.process_queue(&jobs, &cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, DlqueueError::Cancelled));
    assert!(backend.invocations().is_empty());
    assert_eq!(jobs[0].status(), JobStatus::Cancelled);
    assert_eq!(jobs[1].status(), JobStatus::Error);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However many passes run, an always-failing job is attempted at most
    /// MAX_RETRIES + 1 times and ends `Failed` with the capped retry count.
    #[test]
    fn retries_are_capped(passes in 1usize..10) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let backend = ScriptedBackend::new()
            .script(A, std::iter::repeat_n(Step::Fail("boom".into()), 10));
        let processor = QueueProcessor::new(backend.clone());
        let jobs = queued_jobs(&[A]);
        let cancel = CancellationToken::new();

        for _ in 0..passes {
            rt.block_on(processor.process_queue(&jobs, &cancel)).unwrap();
            prop_assert!(jobs[0].retry_count() <= Job::MAX_RETRIES);
        }

        let max_attempts = Job::MAX_RETRIES as usize + 1;
        prop_assert_eq!(backend.attempts_for(A), passes.min(max_attempts));
        if passes > max_attempts {
            prop_assert_eq!(jobs[0].status(), JobStatus::Failed);
            prop_assert_eq!(jobs[0].retry_count(), Job::MAX_RETRIES);
        } else {
            prop_assert_eq!(jobs[0].status(), JobStatus::Error);
        }
    }
}
