//! GitHub API client.
//!
//! The typed [`octocrab`] client is the authenticated transport for REST
//! calls; asset uploads go through a plain [`reqwest`] client against
//! `uploads.github.com` because the upload endpoint takes a raw body. All
//! response models are local serde structs so dry-run mode can fabricate
//! stub values for mutating calls.

use std::path::Path;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::dry_run;
use crate::error::{Error, Result};
use crate::tags::RepoKey;

/// Page size for paginated listings.
pub const PER_PAGE: usize = 100;

pub struct GithubClient {
    octocrab: Octocrab,
    http_client: Client,
    token: Option<String>,
}

/// One entry of the repository tag listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// A single commit status check as delivered by the statuses endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitStatus {
    pub context: String,
    pub state: StatusState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

/// A repository file fetched through the contents API.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub content: String,
    pub sha: String,
}

/// The subset of a GitHub release the engine cares about. Kept local so a
/// dry-run stub can be constructed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let token = token.or_else(|| std::env::var("GITHUB_TOKEN").ok());

        let octocrab = match &token {
            Some(token) => Octocrab::builder().personal_token(token.clone()).build()?,
            None => Octocrab::builder().build()?,
        };

        let http_client = Client::builder()
            .user_agent("shipwright")
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            octocrab,
            http_client,
            token,
        })
    }

    /// Resolve a tag reference to the commit it points at, transparently
    /// dereferencing annotated tag objects. Returns `None` for unknown refs.
    pub async fn resolve_tag(&self, repo: &RepoKey, ref_name: &str) -> Result<Option<String>> {
        let route = format!(
            "/repos/{}/{}/git/ref/tags/{}",
            repo.owner, repo.repo, ref_name
        );
        let reference: GitRef = match self.octocrab.get(&route, None::<&()>).await {
            Ok(reference) => reference,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if reference.object.kind != "tag" {
            return Ok(Some(reference.object.sha));
        }

        // Annotated tag: the referenced object is a tag object whose target
        // is the commit.
        let route = format!(
            "/repos/{}/{}/git/tags/{}",
            repo.owner, repo.repo, reference.object.sha
        );
        let tag_object: GitRef = match self.octocrab.get(&route, None::<&()>).await {
            Ok(tag_object) => tag_object,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(tag_object.object.sha))
    }

    /// List all tags of a repository, walking every page.
    pub async fn list_tags(&self, repo: &RepoKey) -> Result<Vec<TagEntry>> {
        let mut tags = Vec::new();
        let mut page = 1u32;

        loop {
            let route = format!(
                "/repos/{}/{}/tags?per_page={}&page={}",
                repo.owner, repo.repo, PER_PAGE, page
            );
            let batch: Vec<TagEntry> = self.octocrab.get(&route, None::<&()>).await?;
            let len = batch.len();
            tags.extend(batch);

            if len < PER_PAGE {
                break;
            }
            page += 1;
        }

        tracing::debug!("fetched {} tags for {}", tags.len(), repo);
        Ok(tags)
    }

    /// Fetch one page of commit statuses for a ref.
    pub async fn list_statuses(
        &self,
        repo: &RepoKey,
        sha: &str,
        page: u32,
    ) -> Result<Vec<CommitStatus>> {
        let route = format!(
            "/repos/{}/{}/statuses/{}?per_page={}&page={}",
            repo.owner, repo.repo, sha, PER_PAGE, page
        );
        Ok(self.octocrab.get(&route, None::<&()>).await?)
    }

    /// Fetch a repository file through the contents API. 404 maps to `None`.
    pub async fn get_content(
        &self,
        repo: &RepoKey,
        path: &str,
        ref_name: Option<&str>,
    ) -> Result<Option<RepoFile>> {
        let mut route = format!("/repos/{}/{}/contents/{}", repo.owner, repo.repo, path);
        if let Some(ref_name) = ref_name {
            route.push_str(&format!("?ref={ref_name}"));
        }

        let entry: ContentEntry = match self.octocrab.get(&route, None::<&()>).await {
            Ok(entry) => entry,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let content = match entry.content {
            Some(encoded) => decode_content(&encoded)?,
            None => String::new(),
        };

        Ok(Some(RepoFile {
            content,
            sha: entry.sha,
        }))
    }

    /// Look up the release for a tag. 404 maps to `None`.
    pub async fn get_release_by_tag(&self, repo: &RepoKey, tag: &str) -> Result<Option<Release>> {
        let route = format!("/repos/{}/{}/releases/tags/{}", repo.owner, repo.repo, tag);
        match self.octocrab.get(&route, None::<&()>).await {
            Ok(release) => Ok(Some(release)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a release for `tag`. In dry-run mode a stub release is
    /// returned so downstream upload logic stays exercised.
    pub async fn create_release(
        &self,
        repo: &RepoKey,
        tag: &str,
        name: &str,
        body: Option<&str>,
        prerelease: bool,
    ) -> Result<Release> {
        if !dry_run::should_perform() {
            tracing::info!("[dry-run] would create release {} on {}", tag, repo);
            return Ok(Release {
                id: 0,
                tag_name: tag.to_string(),
                html_url: String::new(),
            });
        }

        tracing::info!("creating release {} on {}", tag, repo);
        let route = format!("/repos/{}/{}/releases", repo.owner, repo.repo);
        let payload = serde_json::json!({
            "tag_name": tag,
            "name": name,
            "body": body.unwrap_or(""),
            "draft": false,
            "prerelease": prerelease,
        });
        Ok(self.octocrab.post(&route, Some(&payload)).await?)
    }

    /// Upload a file as a release asset.
    pub async fn upload_asset(
        &self,
        repo: &RepoKey,
        release_id: u64,
        asset_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let asset_name = asset_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgument("invalid asset path".to_string()))?;

        if !dry_run::should_perform() {
            tracing::info!("[dry-run] would upload asset: {}", asset_name);
            return Ok(());
        }

        tracing::info!("uploading asset: {}", asset_name);

        let file_content = tokio::fs::read(asset_path).await?;

        let url = format!(
            "https://uploads.github.com/repos/{}/{}/releases/{}/assets?name={}",
            repo.owner, repo.repo, release_id, asset_name
        );

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", content_type)
            .header("Authorization", format!("Bearer {}", self.require_token()?))
            .body(file_content)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::AssetUpload(format!(
                "{asset_name}: {status} - {error_text}"
            )));
        }

        tracing::info!("successfully uploaded: {}", asset_name);
        Ok(())
    }

    /// Create or update a repository file through the contents API. Pass the
    /// blob sha of the existing file when updating.
    pub async fn put_file(
        &self,
        repo: &RepoKey,
        path: &str,
        message: &str,
        content: &str,
        existing_sha: Option<&str>,
    ) -> Result<()> {
        if !dry_run::should_perform() {
            tracing::info!("[dry-run] would commit {} to {}: {}", path, repo, message);
            return Ok(());
        }

        tracing::info!("committing {} to {}: {}", path, repo, message);
        let route = format!("/repos/{}/{}/contents/{}", repo.owner, repo.repo, path);
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        let mut payload = serde_json::json!({
            "message": message,
            "content": encoded,
        });
        if let Some(sha) = existing_sha {
            payload["sha"] = serde_json::Value::String(sha.to_string());
        }

        let _: serde_json::Value = self.octocrab.put(&route, Some(&payload)).await?;
        Ok(())
    }

    fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            Error::Config("GitHub token not found; set GITHUB_TOKEN".to_string())
        })
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

/// The contents API delivers base64 with embedded newlines.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| Error::Config(format!("invalid base64 content: {err}")))?;
    String::from_utf8(bytes).map_err(|err| Error::Config(format!("non-utf8 content: {err}")))
}

/// Determine the content type for a release asset.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension {
        "gz" | "tgz" => "application/gzip",
        "zip" | "whl" => "application/zip",
        "xz" => "application/x-xz",
        "bz2" => "application/x-bzip2",
        "txt" | "rb" | "podspec" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
