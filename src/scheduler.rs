//! Debounced release scheduling.
//!
//! Status updates arrive in bursts from multiple CI providers. Instead of
//! releasing on the first green aggregate, the scheduler arms a timer per
//! tag; any further event for that tag cancels the timer before the state is
//! re-evaluated, so at most one dispatch happens per quiet period. Once a
//! dispatch has claimed its entry it runs to completion and can no longer be
//! cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;

use crate::config::RepoConfig;
use crate::error::Result;
use crate::github::GithubClient;
use crate::stores::{self, StoreContext};
use crate::tags::{RepoKey, Tag};
use crate::targets::{self, ReleaseContext};
use crate::utils;

pub const DEFAULT_RELEASE_TIMEOUT_SECS: u64 = 60;

/// The debounce window. An empty `RELEASE_TIMEOUT` means the default; any
/// other value is used as-is.
pub fn release_timeout() -> Duration {
    match std::env::var("RELEASE_TIMEOUT") {
        Ok(value) if value.trim().is_empty() => Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS),
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!("RELEASE_TIMEOUT `{}` is not a number, using default", value);
                Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS)
            }
        },
        Err(_) => Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS),
    }
}

struct Pending {
    generation: u64,
    handle: tokio::task::JoinHandle<()>,
}

/// Per-tag release timers. Keys are `owner/repo:ref`.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    github: Arc<GithubClient>,
    pending: Mutex<HashMap<String, Pending>>,
    generations: AtomicU64,
}

pub fn release_id(repo: &RepoKey, tag: &Tag) -> String {
    format!("{}:{}", repo, tag.ref_name)
}

impl Scheduler {
    pub fn new(github: Arc<GithubClient>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                github,
                pending: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Cancel a pending timer for `id`, if one is armed. A dispatch that has
    /// already claimed its entry is unaffected.
    pub fn cancel(&self, id: &str) {
        let removed = {
            let mut pending = self.inner.pending.lock().expect("scheduler lock poisoned");
            pending.remove(id)
        };
        if let Some(entry) = removed {
            entry.handle.abort();
            tracing::info!("cancelled scheduled release of {}", id);
        }
    }

    /// Arm the release timer for a tag, replacing any pending one.
    pub fn schedule(&self, repo: RepoKey, tag: Tag, config: RepoConfig) {
        let id = release_id(&repo, &tag);
        self.cancel(&id);

        let timeout = release_timeout();
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();

        // The map lock is held across spawn and insert so the timer task
        // cannot claim its entry before the entry exists.
        let mut pending = self.inner.pending.lock().expect("scheduler lock poisoned");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            // Claim the entry. If another event replaced or cancelled this
            // timer while it slept, back off.
            {
                let mut pending = inner.pending.lock().expect("scheduler lock poisoned");
                match pending.get(&task_id) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&task_id);
                    }
                    _ => return,
                }
            }

            if let Err(err) =
                dispatch(Arc::clone(&inner.github), repo, tag, config).await
            {
                tracing::error!("release of {} failed: {}", task_id, err);
            }
        });

        pending.insert(id.clone(), Pending { generation, handle });
        tracing::info!(
            "scheduled release of {} in {} seconds",
            id,
            timeout.as_secs()
        );
    }

    /// Whether a timer is currently armed for `id`.
    pub fn is_scheduled(&self, id: &str) -> bool {
        let pending = self.inner.pending.lock().expect("scheduler lock poisoned");
        pending.contains_key(id)
    }
}

/// Run one release: acquire a workspace, bind the store, fan out over all
/// configured targets in parallel. A failing target is logged and does not
/// affect its peers; the release is considered partially successful.
pub async fn dispatch(
    github: Arc<GithubClient>,
    repo: RepoKey,
    tag: Tag,
    config: RepoConfig,
) -> Result<()> {
    tracing::info!("releasing {}:{} ({})", repo, tag.ref_name, tag.sha);

    utils::with_temp_dir(|workspace| async move {
        let store = stores::create_store(
            &config.store,
            StoreContext {
                repo: repo.clone(),
                sha: tag.sha.clone(),
                download_dir: workspace.clone(),
            },
        )?;

        let context = ReleaseContext {
            github,
            repo,
            tag,
            store,
            workspace,
            changelog_path: config.changelog.clone(),
        };

        let runs = config.targets.iter().map(|spec| {
            let context = &context;
            async move {
                if let Err(err) = targets::run_target(context, spec).await {
                    tracing::error!("release target failed: {}", err);
                }
            }
        });
        join_all(runs).await;

        tracing::info!(
            "released {}:{}",
            context.repo,
            context.tag.ref_name
        );
        Ok(())
    })
    .await
}
