//! Commit-status evaluation.
//!
//! Many CI providers attach checks to the same commit, and each provider may
//! report repeatedly under the same context. Only the latest report per
//! context counts; the aggregate over those latest reports decides whether a
//! tag is releasable.

use std::collections::HashMap;

use crate::error::Result;
use crate::github::{CommitStatus, GithubClient, StatusState, PER_PAGE};
use crate::tags::RepoKey;

/// Three-valued summary of a commit's checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateState {
    Pending,
    Success,
    Failed,
}

/// Fetch the statuses for a commit.
///
/// The provider delivers the first page newest-first, which is sufficient:
/// the latest report per context is on it. First pages have occasionally
/// arrived unsorted, though; when that happens all pages are fetched and
/// sorted ascending by `updated_at`. Later pages are not re-checked for
/// order.
pub async fn fetch_statuses(
    github: &GithubClient,
    repo: &RepoKey,
    sha: &str,
) -> Result<Vec<CommitStatus>> {
    let first_page = github.list_statuses(repo, sha, 1).await?;

    if is_sorted_descending(&first_page) {
        return Ok(first_page);
    }

    tracing::warn!(
        "statuses for {}@{} arrived unsorted, falling back to full pagination",
        repo,
        sha
    );

    let mut statuses = first_page;
    let mut page = 2u32;
    while statuses.len() == PER_PAGE * (page as usize - 1) {
        let batch = github.list_statuses(repo, sha, page).await?;
        if batch.is_empty() {
            break;
        }
        statuses.extend(batch);
        page += 1;
    }

    statuses.sort_by_key(|status| status.updated_at);
    Ok(statuses)
}

fn is_sorted_descending(statuses: &[CommitStatus]) -> bool {
    statuses
        .windows(2)
        .all(|pair| pair[0].updated_at >= pair[1].updated_at)
}

/// Reduce raw status reports to the authoritative one per context, dropping
/// contexts that match any ignored prefix.
pub fn filter_latest(statuses: &[CommitStatus], ignored_prefixes: &[String]) -> Vec<CommitStatus> {
    let mut latest: HashMap<&str, &CommitStatus> = HashMap::new();

    for status in statuses {
        if ignored_prefixes
            .iter()
            .any(|prefix| status.context.starts_with(prefix.as_str()))
        {
            continue;
        }

        match latest.get(status.context.as_str()) {
            Some(existing) if existing.updated_at >= status.updated_at => {}
            _ => {
                latest.insert(status.context.as_str(), status);
            }
        }
    }

    latest.into_values().cloned().collect()
}

/// Aggregate the kept checks. An empty set counts as pending: checks are
/// configured but have not reported yet.
pub fn aggregate(statuses: &[CommitStatus]) -> AggregateState {
    if statuses.is_empty() {
        return AggregateState::Pending;
    }
    if statuses
        .iter()
        .any(|status| status.state == StatusState::Pending)
    {
        return AggregateState::Pending;
    }
    if statuses
        .iter()
        .all(|status| status.state == StatusState::Success)
    {
        return AggregateState::Success;
    }
    AggregateState::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn status(context: &str, state: StatusState, minute: u32) -> CommitStatus {
        CommitStatus {
            context: context.to_string(),
            state,
            updated_at: Utc.with_ymd_and_hms(2019, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_filter_latest_keeps_newest_per_context() {
        let statuses = vec![
            status("ci/build", StatusState::Pending, 1),
            status("ci/build", StatusState::Success, 5),
            status("ci/test", StatusState::Success, 3),
        ];

        let kept = filter_latest(&statuses, &[]);
        assert_eq!(kept.len(), 2);
        let build = kept.iter().find(|s| s.context == "ci/build").unwrap();
        assert_eq!(build.state, StatusState::Success);
    }

    #[test]
    fn test_filter_latest_drops_ignored_prefixes() {
        let statuses = vec![
            status("ci/build", StatusState::Success, 1),
            status("codecov/patch", StatusState::Failure, 2),
            status("codecov/project", StatusState::Failure, 3),
        ];

        let kept = filter_latest(&statuses, &["codecov".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].context, "ci/build");
        assert_eq!(aggregate(&kept), AggregateState::Success);
    }

    #[test]
    fn test_aggregate_empty_is_pending() {
        assert_eq!(aggregate(&[]), AggregateState::Pending);
    }

    #[test]
    fn test_aggregate_any_pending_wins() {
        let statuses = vec![
            status("a", StatusState::Success, 1),
            status("b", StatusState::Pending, 2),
            status("c", StatusState::Failure, 3),
        ];
        assert_eq!(aggregate(&statuses), AggregateState::Pending);
    }

    #[test]
    fn test_aggregate_failure_or_error_fails() {
        let failed = vec![
            status("a", StatusState::Success, 1),
            status("b", StatusState::Failure, 2),
        ];
        assert_eq!(aggregate(&failed), AggregateState::Failed);

        let errored = vec![status("a", StatusState::Error, 1)];
        assert_eq!(aggregate(&errored), AggregateState::Failed);
    }

    #[test]
    fn test_aggregate_all_success() {
        let statuses = vec![
            status("a", StatusState::Success, 1),
            status("b", StatusState::Success, 2),
        ];
        assert_eq!(aggregate(&statuses), AggregateState::Success);
    }

    #[test]
    fn test_is_sorted_descending() {
        let sorted = vec![
            status("a", StatusState::Success, 5),
            status("b", StatusState::Success, 3),
            status("c", StatusState::Success, 1),
        ];
        assert!(is_sorted_descending(&sorted));

        let unsorted = vec![
            status("a", StatusState::Success, 1),
            status("b", StatusState::Success, 4),
        ];
        assert!(!is_sorted_descending(&unsorted));
    }
}
