//! Process-wide tag cache.
//!
//! The first lookup for a repository pulls the complete tag list through the
//! paginated API; concurrent callers share that one fetch. Afterwards the
//! list is kept current by `add_tag`/`remove_tag`, which every tag-affecting
//! webhook event goes through, so cached SHAs never go stale.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OnceCell, RwLock};

use crate::error::Result;
use crate::github::GithubClient;

/// Identity of a repository, used to partition the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub owner: String,
    pub repo: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A tag ref resolved to the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub ref_name: String,
    pub sha: String,
}

#[derive(Default)]
struct RepoTags {
    init: OnceCell<()>,
    tags: RwLock<Vec<Tag>>,
}

/// Per-repository tag lists, lazily populated and never evicted.
pub struct TagCache {
    github: Arc<GithubClient>,
    repos: DashMap<RepoKey, Arc<RepoTags>>,
}

impl TagCache {
    pub fn new(github: Arc<GithubClient>) -> Self {
        Self {
            github,
            repos: DashMap::new(),
        }
    }

    async fn entry(&self, repo: &RepoKey) -> Result<Arc<RepoTags>> {
        let entry = {
            let guard = self
                .repos
                .entry(repo.clone())
                .or_insert_with(|| Arc::new(RepoTags::default()));
            Arc::clone(&guard)
        };

        entry
            .init
            .get_or_try_init(|| async {
                let fetched = self.github.list_tags(repo).await?;
                let mut tags = entry.tags.write().await;
                *tags = fetched
                    .into_iter()
                    .map(|t| Tag {
                        ref_name: t.name,
                        sha: t.commit.sha,
                    })
                    .collect();
                Ok::<(), crate::error::Error>(())
            })
            .await?;

        Ok(entry)
    }

    /// All known tags for a repository.
    pub async fn get_tags(&self, repo: &RepoKey) -> Result<Vec<Tag>> {
        let entry = self.entry(repo).await?;
        let tags = entry.tags.read().await;
        Ok(tags.clone())
    }

    /// Find the tag pointing at a commit, if any.
    pub async fn find_tag(&self, repo: &RepoKey, sha: &str) -> Result<Option<Tag>> {
        let entry = self.entry(repo).await?;
        let tags = entry.tags.read().await;
        Ok(tags.iter().find(|tag| tag.sha == sha).cloned())
    }

    /// Insert or refresh a tag; the latest observed sha wins.
    pub async fn add_tag(&self, repo: &RepoKey, ref_name: &str, sha: &str) -> Result<Tag> {
        let entry = self.entry(repo).await?;
        let mut tags = entry.tags.write().await;
        tags.retain(|tag| tag.ref_name != ref_name);
        let tag = Tag {
            ref_name: ref_name.to_string(),
            sha: sha.to_string(),
        };
        tags.push(tag.clone());
        Ok(tag)
    }

    /// Remove a tag by ref; returns whether an entry was removed.
    pub async fn remove_tag(&self, repo: &RepoKey, ref_name: &str) -> Result<bool> {
        let entry = self.entry(repo).await?;
        let mut tags = entry.tags.write().await;
        let before = tags.len();
        tags.retain(|tag| tag.ref_name != ref_name);
        Ok(tags.len() != before)
    }

    /// Mark a repository as populated without fetching, for tests.
    #[cfg(test)]
    pub(crate) async fn seed(&self, repo: &RepoKey, tags: Vec<Tag>) {
        let entry = {
            let guard = self
                .repos
                .entry(repo.clone())
                .or_insert_with(|| Arc::new(RepoTags::default()));
            Arc::clone(&guard)
        };
        *entry.tags.write().await = tags;
        let _ = entry.init.set(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TagCache {
        TagCache::new(Arc::new(GithubClient::new(None).unwrap()))
    }

    #[tokio::test]
    async fn test_add_tag_replaces_existing_ref() {
        let cache = cache();
        let repo = RepoKey::new("owner", "repo");
        cache.seed(&repo, vec![]).await;

        cache.add_tag(&repo, "v1.0.0", "aaa").await.unwrap();
        cache.add_tag(&repo, "v1.0.0", "bbb").await.unwrap();

        let tags = cache.get_tags(&repo).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].sha, "bbb");
    }

    #[tokio::test]
    async fn test_find_tag_by_sha() {
        let cache = cache();
        let repo = RepoKey::new("owner", "repo");
        cache
            .seed(
                &repo,
                vec![Tag {
                    ref_name: "v1.0.0".to_string(),
                    sha: "abc".to_string(),
                }],
            )
            .await;

        let found = cache.find_tag(&repo, "abc").await.unwrap().unwrap();
        assert_eq!(found.ref_name, "v1.0.0");
        assert!(cache.find_tag(&repo, "def").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_tag_clears_sha_lookup() {
        let cache = cache();
        let repo = RepoKey::new("owner", "repo");
        cache.seed(&repo, vec![]).await;

        cache.add_tag(&repo, "v1.0.0", "abc").await.unwrap();
        assert!(cache.remove_tag(&repo, "v1.0.0").await.unwrap());
        assert!(!cache.remove_tag(&repo, "v1.0.0").await.unwrap());
        assert!(cache.find_tag(&repo, "abc").await.unwrap().is_none());
    }
}
