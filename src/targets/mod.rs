//! Release targets.
//!
//! A target publishes the artifacts of one release to one destination. The
//! engine resolves each entry of `targets:` in the repository configuration
//! to a registered driver and invokes it with a fresh context; a failing
//! target is logged and never cancels its peers. A target whose credentials
//! or configuration are absent logs the missing prerequisite and returns
//! cleanly.

mod brew;
mod cocoapods;
mod crates;
mod docker;
mod github;
mod npm;
mod pypi;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Mapping;

use crate::config::TargetSpec;
use crate::error::{Error, Result};
use crate::github::GithubClient;
use crate::stores::ArtifactStore;
use crate::tags::{RepoKey, Tag};

pub use brew::BrewTarget;
pub use cocoapods::CocoapodsTarget;
pub use crates::CratesTarget;
pub use docker::DockerTarget;
pub use github::GithubTarget;
pub use npm::NpmTarget;
pub use pypi::PypiTarget;

/// Everything one release attempt shares across its targets.
pub struct ReleaseContext {
    pub github: Arc<GithubClient>,
    pub repo: RepoKey,
    pub tag: Tag,
    pub store: Arc<dyn ArtifactStore>,
    pub workspace: PathBuf,
    pub changelog_path: String,
}

/// The per-target view: the shared release context plus the driver-specific
/// options block from the configuration.
pub struct TargetContext {
    pub github: Arc<GithubClient>,
    pub repo: RepoKey,
    pub tag: Tag,
    pub store: Arc<dyn ArtifactStore>,
    pub workspace: PathBuf,
    pub changelog_path: String,
    pub options: Mapping,
}

impl TargetContext {
    /// Fetch a string option from the target's configuration block.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(serde_yaml::Value::from(key))
            .and_then(|value| value.as_str())
    }
}

#[async_trait]
pub trait Target: Send + Sync {
    async fn publish(&self, ctx: &TargetContext) -> Result<()>;
}

/// Look up a registered target driver by name.
pub fn create_target(name: &str) -> Result<Box<dyn Target>> {
    match name {
        "github" => Ok(Box::new(GithubTarget)),
        "npm" => Ok(Box::new(NpmTarget)),
        "pypi" => Ok(Box::new(PypiTarget)),
        "crates" => Ok(Box::new(CratesTarget)),
        "cocoapods" => Ok(Box::new(CocoapodsTarget)),
        "brew" => Ok(Box::new(BrewTarget)),
        "docker" => Ok(Box::new(DockerTarget)),
        other => Err(Error::UnknownTarget(other.to_string())),
    }
}

/// Resolve a target spec and run the driver with its own copy of the
/// release context.
pub async fn run_target(base: &ReleaseContext, spec: &TargetSpec) -> Result<()> {
    let (name, options) = spec.resolved()?;
    let target = create_target(&name)?;

    tracing::info!(
        "running release target {} for {}:{}",
        name,
        base.repo,
        base.tag.ref_name
    );

    let ctx = TargetContext {
        github: Arc::clone(&base.github),
        repo: base.repo.clone(),
        tag: base.tag.clone(),
        store: Arc::clone(&base.store),
        workspace: base.workspace.clone(),
        changelog_path: base.changelog_path.clone(),
        options,
    };

    target.publish(&ctx).await
}

/// Read a non-empty environment variable, the way drivers look up their
/// credentials and binary overrides.
pub(crate) fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
