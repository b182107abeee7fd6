//! Object-storage store.
//!
//! CI drops build artifacts under `{owner}/{repo}/{sha}/` in a bucket; the
//! driver lists that prefix and downloads objects by key. The file name is
//! the basename of the key.

use std::path::PathBuf;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use tokio::sync::OnceCell;

use super::{ArtifactFile, ArtifactStore, DownloadCache, StoreContext};
use crate::error::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    context: StoreContext,
    files: OnceCell<Vec<ArtifactFile>>,
    downloads: DownloadCache,
}

impl S3Store {
    pub fn from_env(context: StoreContext) -> Result<Self> {
        let bucket = require_env("S3_BUCKET")?;
        let access_key = require_env("S3_ACCESS_KEY")?;
        let secret_key = require_env("S3_SECRET_KEY")?;
        let region = std::env::var("S3_REGION")
            .ok()
            .filter(|region| !region.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = Credentials::new(access_key, secret_key, None, None, "environment");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
            context,
            files: OnceCell::new(),
            downloads: DownloadCache::new(),
        })
    }

    fn prefix(&self) -> String {
        format!(
            "{}/{}/{}/",
            self.context.repo.owner, self.context.repo.repo, self.context.sha
        )
    }

    async fn fetch_listing(&self) -> Result<Vec<ArtifactFile>> {
        let prefix = self.prefix();
        let mut files = Vec::new();

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| Error::Store(format!("object listing failed: {err}")))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.rsplit('/').next().unwrap_or(key);
                if name.is_empty() {
                    continue;
                }
                files.push(ArtifactFile {
                    key: key.to_string(),
                    name: name.to_string(),
                    download_url: None,
                    content_type: None,
                });
            }
        }

        tracing::info!(
            "found {} artifacts under s3://{}/{}",
            files.len(),
            self.bucket,
            prefix
        );
        Ok(files)
    }

    async fn download(&self, file: &ArtifactFile) -> Result<PathBuf> {
        tracing::debug!("downloading artifact: {}", file.key);

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&file.key)
            .send()
            .await
            .map_err(|err| Error::Store(format!("download of {} failed: {err}", file.key)))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|err| Error::Store(format!("download of {} failed: {err}", file.key)))?
            .into_bytes();

        let path = self.context.download_dir.join(&file.name);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for S3Store {
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
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Store(format!("{key} is not set")))
}
