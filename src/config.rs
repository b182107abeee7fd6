//! Per-repository release configuration.
//!
//! Each repository opts in by carrying a `release.yml` at its root:
//!
//! ```yaml
//! store: zeus
//! targets:
//!   - github
//!   - name: brew
//!     tap: owner/homebrew-tap
//! ignoredChecks: [codecov]
//! changelog: CHANGELOG.md
//! ```
//!
//! The file is fetched through the contents API on every event; a missing
//! file means the repository is not managed and the event is ignored.

use serde::Deserialize;
use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::github::GithubClient;
use crate::tags::RepoKey;

pub const CONFIG_PATH: &str = "release.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    #[serde(default = "default_store")]
    pub store: String,

    #[serde(default)]
    pub targets: Vec<TargetSpec>,

    #[serde(default)]
    pub ignored_checks: Vec<String>,

    #[serde(default = "default_changelog")]
    pub changelog: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            targets: Vec::new(),
            ignored_checks: Vec::new(),
            changelog: default_changelog(),
        }
    }
}

fn default_store() -> String {
    "zeus".to_string()
}

fn default_changelog() -> String {
    "CHANGELOG.md".to_string()
}

/// A target entry: either the bare driver name or a mapping with a `name`
/// key plus driver-specific options.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Name(String),
    Spec(Mapping),
}

impl TargetSpec {
    /// Resolve to `(driver name, options)`. The options mapping keeps the
    /// `name` key; drivers ignore it.
    pub fn resolved(&self) -> Result<(String, Mapping)> {
        match self {
            TargetSpec::Name(name) => {
                if name.trim().is_empty() {
                    return Err(Error::MissingTargetSpec);
                }
                Ok((name.clone(), Mapping::new()))
            }
            TargetSpec::Spec(mapping) => {
                let name = mapping
                    .get(serde_yaml::Value::from("name"))
                    .and_then(|value| value.as_str())
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty())
                    .ok_or(Error::MissingTargetSpec)?;
                Ok((name.to_string(), mapping.clone()))
            }
        }
    }
}

impl RepoConfig {
    /// Load the configuration of a repository, or `None` when the repo does
    /// not carry a `release.yml`.
    pub async fn load(github: &GithubClient, repo: &RepoKey) -> Result<Option<RepoConfig>> {
        let Some(file) = github.get_content(repo, CONFIG_PATH, None).await? else {
            return Ok(None);
        };

        let config: RepoConfig = serde_yaml::from_str(&file.content)
            .map_err(|err| Error::Config(format!("invalid {CONFIG_PATH} in {repo}: {err}")))?;
        Ok(Some(config))
    }
}
