//! Webhook event handling.
//!
//! Three event families drive the engine: tag creation, tag deletion, and
//! commit-status updates. Every event first loads the repository's release
//! configuration; repositories without one are not managed and their events
//! are dropped. Status updates for commits no cached tag points at are
//! likewise dropped.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::RepoConfig;
use crate::error::Result;
use crate::github::GithubClient;
use crate::scheduler::{release_id, Scheduler};
use crate::status::{self, AggregateState};
use crate::tags::{RepoKey, Tag, TagCache};

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: OwnerPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerPayload {
    pub login: String,
}

impl RepositoryPayload {
    fn key(&self) -> RepoKey {
        RepoKey::new(self.owner.login.clone(), self.name.clone())
    }
}

/// Payload of `create` and `delete` events.
#[derive(Debug, Clone, Deserialize)]
pub struct RefPayload {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub ref_type: String,
    pub repository: RepositoryPayload,
}

/// Payload of `status` events.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub sha: String,
    pub repository: RepositoryPayload,
}

/// A webhook delivery the engine acts on.
#[derive(Debug, Clone)]
pub enum Event {
    TagCreated(RefPayload),
    TagDeleted(RefPayload),
    StatusUpdated(StatusPayload),
}

impl Event {
    /// Translate a webhook delivery into an engine event. Unknown kinds and
    /// malformed payloads yield `None`.
    pub fn from_webhook(kind: &str, payload: serde_json::Value) -> Option<Event> {
        let event = match kind {
            "create" => Event::TagCreated(parse_payload(kind, payload)?),
            "delete" => Event::TagDeleted(parse_payload(kind, payload)?),
            "status" => Event::StatusUpdated(parse_payload(kind, payload)?),
            _ => return None,
        };
        Some(event)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: serde_json::Value,
) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("malformed {} payload: {}", kind, err);
            None
        }
    }
}

/// Drives the tag cache, status evaluation and the scheduler from webhook
/// events.
pub struct Dispatcher {
    github: Arc<GithubClient>,
    tags: TagCache,
    scheduler: Scheduler,
}

impl Dispatcher {
    pub fn new(github: Arc<GithubClient>) -> Self {
        Self {
            tags: TagCache::new(Arc::clone(&github)),
            scheduler: Scheduler::new(Arc::clone(&github)),
            github,
        }
    }

    pub async fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::TagCreated(payload) => self.on_tag_created(payload).await,
            Event::TagDeleted(payload) => self.on_tag_deleted(payload).await,
            Event::StatusUpdated(payload) => self.on_status(payload).await,
        }
    }

    async fn on_tag_created(&self, payload: RefPayload) -> Result<()> {
        if payload.ref_type != "tag" {
            return Ok(());
        }
        let repo = payload.repository.key();

        let Some(config) = RepoConfig::load(&self.github, &repo).await? else {
            tracing::debug!("{} has no release configuration, ignoring", repo);
            return Ok(());
        };

        let Some(sha) = self.github.resolve_tag(&repo, &payload.ref_name).await? else {
            tracing::warn!("tag {} on {} did not resolve", payload.ref_name, repo);
            return Ok(());
        };

        tracing::info!("tag {} created on {} at {}", payload.ref_name, repo, sha);
        let tag = self.tags.add_tag(&repo, &payload.ref_name, &sha).await?;
        self.process_tag(&repo, &tag, config).await
    }

    async fn on_tag_deleted(&self, payload: RefPayload) -> Result<()> {
        if payload.ref_type != "tag" {
            return Ok(());
        }
        let repo = payload.repository.key();

        if RepoConfig::load(&self.github, &repo).await?.is_none() {
            tracing::debug!("{} has no release configuration, ignoring", repo);
            return Ok(());
        }

        if self.tags.remove_tag(&repo, &payload.ref_name).await? {
            tracing::info!("tag {} deleted on {}", payload.ref_name, repo);
        }
        Ok(())
    }

    async fn on_status(&self, payload: StatusPayload) -> Result<()> {
        let repo = payload.repository.key();

        let Some(config) = RepoConfig::load(&self.github, &repo).await? else {
            tracing::debug!("{} has no release configuration, ignoring", repo);
            return Ok(());
        };

        let Some(tag) = self.tags.find_tag(&repo, &payload.sha).await? else {
            tracing::debug!(
                "no tag points at {} on {}, ignoring status update",
                payload.sha,
                repo
            );
            return Ok(());
        };

        self.process_tag(&repo, &tag, config).await
    }

    /// Evaluate a tag's checks and drive the scheduler accordingly. Any
    /// event for a tag disarms its pending timer before re-evaluation, so a
    /// burst of updates results in at most one dispatch per quiet window.
    async fn process_tag(&self, repo: &RepoKey, tag: &Tag, config: RepoConfig) -> Result<()> {
        let id = release_id(repo, tag);
        self.scheduler.cancel(&id);

        let statuses = status::fetch_statuses(&self.github, repo, &tag.sha).await?;
        let kept = status::filter_latest(&statuses, &config.ignored_checks);

        match status::aggregate(&kept) {
            AggregateState::Pending => {
                tracing::info!("status checks for {} are still pending", id);
            }
            AggregateState::Failed => {
                tracing::info!("status checks for {} have failed", id);
            }
            AggregateState::Success if config.targets.is_empty() => {
                tracing::info!("no targets configured for {}, nothing to release", id);
            }
            AggregateState::Success => {
                tracing::info!("status checks for {} are green", id);
                self.scheduler
                    .schedule(repo.clone(), tag.clone(), config);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repository() -> serde_json::Value {
        json!({"name": "repo", "owner": {"login": "owner"}})
    }

    #[test]
    fn test_create_event_parses() {
        let payload = json!({
            "ref": "v1.0.0",
            "ref_type": "tag",
            "repository": repository(),
        });

        let Some(Event::TagCreated(parsed)) = Event::from_webhook("create", payload) else {
            panic!("expected a create event");
        };
        assert_eq!(parsed.ref_name, "v1.0.0");
        assert_eq!(parsed.ref_type, "tag");
        assert_eq!(parsed.repository.key(), RepoKey::new("owner", "repo"));
    }

    #[test]
    fn test_status_event_parses() {
        let payload = json!({
            "sha": "abc123",
            "state": "success",
            "context": "ci/build",
            "repository": repository(),
        });

        let Some(Event::StatusUpdated(parsed)) = Event::from_webhook("status", payload) else {
            panic!("expected a status event");
        };
        assert_eq!(parsed.sha, "abc123");
    }

    #[test]
    fn test_unknown_and_malformed_events_are_dropped() {
        assert!(Event::from_webhook("push", json!({})).is_none());
        assert!(Event::from_webhook("create", json!({"ref": 42})).is_none());
    }
}
