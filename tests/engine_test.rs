//! Engine behavior: status aggregation feeding the debounced scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use shipwright::config::RepoConfig;
use shipwright::github::{CommitStatus, GithubClient, StatusState};
use shipwright::scheduler::{release_id, Scheduler, DEFAULT_RELEASE_TIMEOUT_SECS};
use shipwright::status::{aggregate, filter_latest, AggregateState};
use shipwright::tags::{RepoKey, Tag};

fn status(context: &str, state: StatusState, minute: u32) -> CommitStatus {
    CommitStatus {
        context: context.to_string(),
        state,
        updated_at: Utc.with_ymd_and_hms(2019, 3, 1, 12, minute, 0).unwrap(),
    }
}

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(GithubClient::new(None).unwrap()))
}

fn sample_release() -> (RepoKey, Tag, RepoConfig) {
    (
        RepoKey::new("owner", "repo"),
        Tag {
            ref_name: "v1.0.0".to_string(),
            sha: "abc".to_string(),
        },
        RepoConfig::default(),
    )
}

#[test]
fn test_burst_of_updates_ends_pending() {
    // Two green reports followed by a pending one on the same context: the
    // latest report wins and the tag is not releasable.
    let statuses = vec![
        status("ci/build", StatusState::Success, 1),
        status("ci/build", StatusState::Success, 2),
        status("ci/build", StatusState::Pending, 3),
    ];

    let kept = filter_latest(&statuses, &[]);
    assert_eq!(kept.len(), 1);
    assert_eq!(aggregate(&kept), AggregateState::Pending);
}

#[test]
fn test_ignored_checks_do_not_block_release() {
    let statuses = vec![
        status("ci/build", StatusState::Success, 1),
        status("codecov/patch", StatusState::Failure, 2),
    ];

    let kept = filter_latest(&statuses, &["codecov".to_string()]);
    assert_eq!(aggregate(&kept), AggregateState::Success);
}

#[tokio::test(start_paused = true)]
async fn test_any_event_resets_the_window() {
    let scheduler = scheduler();
    let (repo, tag, config) = sample_release();
    let id = release_id(&repo, &tag);

    scheduler.schedule(repo.clone(), tag.clone(), config.clone());

    // Halfway through the window a new event arrives: cancel and re-arm.
    tokio::time::advance(Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS / 2)).await;
    scheduler.cancel(&id);
    assert!(!scheduler.is_scheduled(&id));
    scheduler.schedule(repo, tag, config);

    // The original deadline passes without a dispatch claiming the entry.
    tokio::time::advance(Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS / 2 + 1)).await;
    tokio::task::yield_now().await;
    assert!(scheduler.is_scheduled(&id));

    // The replacement deadline fires.
    tokio::time::advance(Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS)).await;
    tokio::task::yield_now().await;
    assert!(!scheduler.is_scheduled(&id));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_prevents_dispatch() {
    let scheduler = scheduler();
    let (repo, tag, config) = sample_release();
    let id = release_id(&repo, &tag);

    scheduler.schedule(repo, tag, config);
    scheduler.cancel(&id);

    tokio::time::advance(Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS * 2)).await;
    tokio::task::yield_now().await;
    assert!(!scheduler.is_scheduled(&id));
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_pending_release_per_tag() {
    let scheduler = scheduler();
    let (repo, tag, config) = sample_release();
    let id = release_id(&repo, &tag);

    for _ in 0..5 {
        scheduler.schedule(repo.clone(), tag.clone(), config.clone());
    }

    assert!(scheduler.is_scheduled(&id));
}
