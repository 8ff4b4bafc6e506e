// tests/job_record.rs

use dlqueue::exec::Outcome;
use dlqueue::job::{Job, JobChange, JobEvent, JobNotifier};
use dlqueue::types::{JobOptions, JobStatus};
use dlqueue_test_utils::builders::JobBuilder;
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobChange> {
    let mut changes = Vec::new();
    while let Ok(event) = rx.try_recv() {
        changes.push(event.change);
    }
    changes
}

#[test]
fn new_job_starts_queued_and_empty() {
    let job = Job::new(7, "https://example.com/v", JobOptions::default(), JobNotifier::default());
    assert_eq!(job.id(), 7);
    assert_eq!(job.status(), JobStatus::Queued);
    assert_eq!(job.progress(), 0.0);
    assert_eq!(job.retry_count(), 0);
    assert_eq!(job.error_message(), None);
    assert_eq!(job.title(), None);
    assert_eq!(job.display_name(), "https://example.com/v");
}

#[test]
fn display_name_prefers_title() {
    let job = JobBuilder::new(1, "https://example.com/v").title("A Video").build();
    assert_eq!(job.display_name(), "A Video");
}

#[test]
fn progress_only_moves_while_downloading() {
    let job = JobBuilder::new(1, "u").build();
    job.set_progress(0.5);
    assert_eq!(job.progress(), 0.0);

    job.begin_attempt();
    job.set_progress(0.5);
    assert_eq!(job.progress(), 0.5);

    job.set_progress(7.0);
    assert_eq!(job.progress(), 1.0);
    job.set_progress(f64::NAN);
    assert_eq!(job.progress(), 1.0);

    job.apply_outcome(&Outcome::Finished);
    job.set_progress(0.2);
    assert_eq!(job.progress(), 1.0);
}

#[test]
fn tiny_progress_changes_are_not_published() {
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let job = JobBuilder::new(1, "u").notifier(notifier).build();

    job.begin_attempt();
    drain(&mut rx);

    job.set_progress(0.25);
    job.set_progress(0.25005);
    job.set_progress(0.26);

    assert_eq!(
        drain(&mut rx),
        vec![JobChange::Progress(0.25), JobChange::Progress(0.26)]
    );
}

#[test]
fn error_message_only_lives_in_error_states() {
    let job = JobBuilder::new(1, "u").build();
    job.mark_error("Video not found (404)");
    assert_eq!(job.status(), JobStatus::Error);
    assert_eq!(job.error_message().as_deref(), Some("Video not found (404)"));

    for _ in 0..Job::MAX_RETRIES {
        job.increment_retry();
    }
    assert!(job.mark_failed());
    assert_eq!(job.error_message().as_deref(), Some("Video not found (404)"));

    job.apply_outcome(&Outcome::Cancelled);
    assert_eq!(job.error_message(), None);
}

#[test]
fn failed_requires_error_with_exhausted_retries() {
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let job = JobBuilder::new(1, "u").notifier(notifier).build();

    assert!(!job.mark_failed());
    assert!(!job.transition(JobStatus::Queued, JobStatus::Failed));
    assert_eq!(job.status(), JobStatus::Queued);

    job.mark_error("boom");
    job.increment_retry();
    job.increment_retry();
    assert!(!job.mark_failed());
    assert!(!job.transition(JobStatus::Error, JobStatus::Failed));
    assert_eq!(job.status(), JobStatus::Error);

    job.increment_retry();
    drain(&mut rx);
    assert!(job.mark_failed());
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(drain(&mut rx), vec![JobChange::Status(JobStatus::Failed)]);
    assert!(!job.mark_failed());
}

#[test]
fn built_failed_job_satisfies_retry_cap() {
    let job = JobBuilder::new(1, "u").status(JobStatus::Failed).build();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.retry_count(), Job::MAX_RETRIES);
    assert!(job.error_message().is_some());
}

#[test]
fn begin_attempt_clears_error_and_progress() {
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let job = JobBuilder::new(1, "u").notifier(notifier).build();

    job.begin_attempt();
    job.set_progress(0.4);
    job.mark_error("boom");
    drain(&mut rx);

    job.begin_attempt();
    assert_eq!(job.status(), JobStatus::Downloading);
    assert_eq!(job.error_message(), None);
    assert_eq!(job.progress(), 0.0);
    assert_eq!(
        drain(&mut rx),
        vec![
            JobChange::Status(JobStatus::Downloading),
            JobChange::ErrorMessage(None),
            JobChange::Progress(0.0),
        ]
    );
}

#[test]
fn retry_count_saturates() {
    let job = JobBuilder::new(1, "u").build();
    for expected in 1..=Job::MAX_RETRIES {
        assert_eq!(job.increment_retry(), expected);
    }
    assert_eq!(job.increment_retry(), Job::MAX_RETRIES);
    assert_eq!(job.retry_count(), Job::MAX_RETRIES);
}

#[test]
fn can_retry_depends_on_status_and_count() {
    assert!(JobBuilder::new(1, "u").errored("x", 0).build().can_retry());
    assert!(JobBuilder::new(1, "u").errored("x", 2).build().can_retry());
    assert!(!JobBuilder::new(1, "u").errored("x", 3).build().can_retry());
    assert!(!JobBuilder::new(1, "u").status(JobStatus::Queued).build().can_retry());
}

#[test]
fn transition_is_compare_and_set() {
    let job = JobBuilder::new(1, "u").build();
    assert!(job.transition(JobStatus::Queued, JobStatus::FetchingInfo));
    assert!(!job.transition(JobStatus::Queued, JobStatus::Cancelled));
    assert_eq!(job.status(), JobStatus::FetchingInfo);
    assert!(job.transition(JobStatus::FetchingInfo, JobStatus::Queued));
}

#[test]
fn outcomes_map_to_statuses() {
    let job = JobBuilder::new(1, "u").build();

    job.apply_outcome(&Outcome::TimedOut("Download timed out after 30 minutes".into()));
    assert_eq!(job.status(), JobStatus::Error);
    assert_eq!(
        job.error_message().as_deref(),
        Some("Download timed out after 30 minutes")
    );

    job.apply_outcome(&Outcome::Finished);
    assert_eq!(job.status(), JobStatus::Finished);
    assert_eq!(job.error_message(), None);

    job.apply_outcome(&Outcome::Cancelled);
    assert_eq!(job.status(), JobStatus::Cancelled);
}

#[test]
fn unchanged_values_publish_nothing() {
    let notifier = JobNotifier::default();
    let mut rx = notifier.subscribe();
    let job = JobBuilder::new(1, "u").notifier(notifier).build();

    assert!(job.transition(JobStatus::Queued, JobStatus::Queued));
    job.set_title("t");
    job.set_title("t");
    assert_eq!(drain(&mut rx), vec![JobChange::Title("t".into())]);
}

#[test]
fn status_helpers() {
    assert!(JobStatus::Finished.is_terminal());
    assert!(JobStatus::Cancelled.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(!JobStatus::Error.is_terminal());
    assert!(JobStatus::FetchingInfo.is_pending());
    assert_eq!(JobStatus::FetchingInfo.to_string(), "Fetching info...");
}

#[test]
fn option_presentation() {
    assert_eq!(JobOptions::default().preset_display(), "Default");
    assert_eq!(JobOptions::new("mp4", false, false).preset_display(), "MP4");
    assert_eq!(JobOptions::default().summary(), "No extra options");
    assert_eq!(JobOptions::new("", true, true).summary(), "Playlist, Subtitles");
    assert_eq!(JobOptions::new("", false, true).summary(), "Subtitles");
}
