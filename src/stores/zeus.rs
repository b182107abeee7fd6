//! Build-aggregator store.
//!
//! Zeus collects the artifacts CI produced for a commit and exposes them
//! under `/api/repos/gh/{owner}/{repo}/releases/{sha}/artifacts`. Every
//! artifact carries a pre-authenticated download URL; downloads stream over
//! HTTPS with the API token as a bearer.

use std::path::PathBuf;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use super::{ArtifactFile, ArtifactStore, DownloadCache, StoreCapabilities, StoreContext};
use crate::error::{Error, Result};

const DEFAULT_SERVER_URL: &str = "https://zeus.ci";

pub struct ZeusStore {
    http_client: Client,
    server_url: String,
    token: String,
    context: StoreContext,
    files: OnceCell<Vec<ArtifactFile>>,
    downloads: DownloadCache,
}

#[derive(Debug, Deserialize)]
struct ZeusArtifact {
    id: String,
    name: String,
    download_url: String,
    #[serde(rename = "type")]
    content_type: Option<String>,
}

impl ZeusStore {
    pub fn from_env(context: StoreContext) -> Result<Self> {
        let token = std::env::var("ZEUS_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Store("ZEUS_API_TOKEN is not set".to_string()))?;

        let server_url = std::env::var("ZEUS_SERVER_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let http_client = Client::builder()
            .user_agent("shipwright")
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http_client,
            server_url: server_url.trim_end_matches('/').to_string(),
            token,
            context,
            files: OnceCell::new(),
            downloads: DownloadCache::new(),
        })
    }

    async fn fetch_listing(&self) -> Result<Vec<ArtifactFile>> {
        let url = format!(
            "{}/api/repos/gh/{}/{}/releases/{}/artifacts",
            self.server_url, self.context.repo.owner, self.context.repo.repo, self.context.sha
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        // An unknown release simply has no artifacts.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "artifact listing for {} failed: {}",
                self.context.sha,
                response.status()
            )));
        }

        let artifacts: Vec<ZeusArtifact> = response.json().await?;
        tracing::info!(
            "found {} artifacts for {}@{}",
            artifacts.len(),
            self.context.repo,
            self.context.sha
        );

        Ok(artifacts
            .into_iter()
            .map(|artifact| ArtifactFile {
                key: artifact.id,
                name: artifact.name,
                download_url: Some(artifact.download_url),
                content_type: artifact.content_type,
            })
            .collect())
    }

    async fn download(&self, file: &ArtifactFile) -> Result<PathBuf> {
        let url = file
            .download_url
            .as_deref()
            .ok_or_else(|| Error::Store(format!("artifact {} has no download URL", file.name)))?;
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.server_url, url)
        };

        tracing::debug!("downloading artifact: {}", file.name);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        let path = self.context.download_dir.join(&file.name);
        let mut output = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            output.write_all(&chunk?).await?;
        }
        output.flush().await?;

        Ok(path)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for ZeusStore {
    async fn list_files(&self) -> Result<Vec<ArtifactFile>> {
        let files = self
            .files
            .get_or_try_init(|| self.fetch_listing())
            .await?;
        Ok(files.clone())
    }

    async fn download_file(&self, file: &ArtifactFile) -> Result<PathBuf> {
        self.downloads
            .get_or_download(&file.key, || self.download(file))
            .await
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            preserves_content_type: true,
        }
    }
}
