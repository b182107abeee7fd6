//! Artifact stores.
//!
//! A store enumerates and retrieves the build artifacts attached to one
//! `(repository, commit)` pair. Instances are bound to a single release
//! attempt and its download directory; both the artifact listing and every
//! download are memoized, so targets can ask for the same file concurrently
//! without duplicate fetches.

mod s3;
mod zeus;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::try_join_all;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::tags::RepoKey;

pub use s3::S3Store;
pub use zeus::ZeusStore;

/// What a store instance is bound to: one commit of one repository, and the
/// directory downloads land in.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub repo: RepoKey,
    pub sha: String,
    pub download_dir: PathBuf,
}

/// A single artifact as reported by a store.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Driver-internal key, unique within the listing.
    pub key: String,
    /// Basename the file is downloaded as.
    pub name: String,
    /// Pre-authenticated download location, for drivers that have one.
    pub download_url: Option<String>,
    /// Artifact media type, for drivers that preserve it.
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCapabilities {
    /// Whether `ArtifactFile::content_type` carries the original type.
    pub preserves_content_type: bool,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Enumerate all artifacts for the bound commit. Memoized: the remote
    /// listing is fetched once per store instance.
    async fn list_files(&self) -> Result<Vec<ArtifactFile>>;

    /// Download one artifact into the bound directory and return its local
    /// path. Memoized by file key; concurrent calls share one download.
    async fn download_file(&self, file: &ArtifactFile) -> Result<PathBuf>;

    /// Download many artifacts in parallel.
    async fn download_files(&self, files: &[ArtifactFile]) -> Result<Vec<PathBuf>> {
        try_join_all(files.iter().map(|file| self.download_file(file))).await
    }

    /// Download every artifact of the listing.
    async fn download_all(&self) -> Result<Vec<PathBuf>> {
        let files = self.list_files().await?;
        self.download_files(&files).await
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }
}

/// Instantiate the store driver named in the repository configuration.
pub fn create_store(name: &str, context: StoreContext) -> Result<Arc<dyn ArtifactStore>> {
    match name {
        "s3" => Ok(Arc::new(S3Store::from_env(context)?)),
        "zeus" => Ok(Arc::new(ZeusStore::from_env(context)?)),
        other => Err(Error::UnknownStore(other.to_string())),
    }
}

/// Per-key download memoization: the first caller runs the download, later
/// callers wait on the same result.
pub(crate) struct DownloadCache {
    cells: DashMap<String, Arc<OnceCell<PathBuf>>>,
}

impl DownloadCache {
    pub(crate) fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    pub(crate) async fn get_or_download<F, Fut>(&self, key: &str, download: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PathBuf>>,
    {
        let cell = {
            let guard = self
                .cells
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()));
            Arc::clone(&guard)
        };

        let path = cell
            .get_or_try_init(|| async {
                let path = download().await?;
                // Give the filesystem a moment so the finished file is
                // observable to readers racing with this download.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok::<PathBuf, Error>(path)
            })
            .await?;

        Ok(path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_download_cache_runs_once_per_key() {
        let cache = DownloadCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let path = cache
                .get_or_download("file-1", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(PathBuf::from("/tmp/file-1")) }
                })
                .await
                .unwrap();
            assert_eq!(path, PathBuf::from("/tmp/file-1"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_cache_concurrent_callers_share_one_download() {
        let cache = Arc::new(DownloadCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_download("shared", move || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            async {
                                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                                Ok(PathBuf::from("/tmp/shared"))
                            }
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), PathBuf::from("/tmp/shared"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_store_is_rejected() {
        let context = StoreContext {
            repo: RepoKey::new("owner", "repo"),
            sha: "abc".to_string(),
            download_dir: PathBuf::from("/tmp"),
        };
        assert!(matches!(
            create_store("gcs", context),
            Err(Error::UnknownStore(_))
        ));
    }

    #[tokio::test]
    async fn test_distinct_keys_download_separately() {
        let cache = DownloadCache::new();
        let calls = AtomicU32::new(0);

        for key in ["a", "b"] {
            cache
                .get_or_download(key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let path = PathBuf::from(format!("/tmp/{key}"));
                    async move { Ok(path) }
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
