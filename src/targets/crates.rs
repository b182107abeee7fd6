//! Rust-workspace target.
//!
//! Checks out the tagged commit, discovers the workspace members, and runs
//! `cargo publish` for each crate in dependency order: a crate is published
//! only after every workspace crate it depends on. Requires
//! `CARGO_REGISTRY_TOKEN`; the binary can be overridden with `CARGO_BIN`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cargo_manifest::Manifest;

use super::{optional_env, Target, TargetContext};
use crate::dry_run;
use crate::error::{Error, Result};
use crate::process::{self, SpawnOptions};

pub struct CratesTarget;

#[derive(Debug, Clone)]
pub(crate) struct WorkspaceCrate {
    pub(crate) name: String,
    pub(crate) manifest_path: PathBuf,
    /// Names of crates this one depends on, intra-workspace or not.
    pub(crate) dependencies: HashSet<String>,
}

fn read_crate(manifest_path: &Path) -> Result<Option<WorkspaceCrate>> {
    let manifest = Manifest::from_path(manifest_path)
        .map_err(|err| Error::Config(format!("{}: {err}", manifest_path.display())))?;

    let Some(package) = manifest.package else {
        return Ok(None);
    };

    let mut dependencies = HashSet::new();
    for deps in [manifest.dependencies, manifest.build_dependencies] {
        if let Some(deps) = deps {
            dependencies.extend(deps.keys().cloned());
        }
    }

    Ok(Some(WorkspaceCrate {
        name: package.name,
        manifest_path: manifest_path.to_path_buf(),
        dependencies,
    }))
}

/// Discover all publishable crates under a checkout: the root package, or
/// every workspace member (plain paths and single-level `*` globs).
fn collect_crates(checkout: &Path) -> Result<Vec<WorkspaceCrate>> {
    let root_manifest_path = checkout.join("Cargo.toml");
    let manifest = Manifest::from_path(&root_manifest_path)
        .map_err(|err| Error::Config(format!("{}: {err}", root_manifest_path.display())))?;

    let mut crates = Vec::new();

    if let Some(workspace) = manifest.workspace {
        for member in &workspace.members {
            for dir in expand_member(checkout, member)? {
                let manifest_path = dir.join("Cargo.toml");
                if !manifest_path.is_file() {
                    continue;
                }
                if let Some(found) = read_crate(&manifest_path)? {
                    crates.push(found);
                }
            }
        }
    }

    // Root package (possibly alongside a workspace table). Members listed
    // as "." would otherwise appear twice.
    if let Some(found) = read_crate(&root_manifest_path)? {
        if !crates.iter().any(|c| c.name == found.name) {
            crates.push(found);
        }
    }

    Ok(crates)
}

fn expand_member(checkout: &Path, member: &str) -> Result<Vec<PathBuf>> {
    if let Some(parent) = member.strip_suffix("/*") {
        let base = checkout.join(parent);
        let mut dirs = Vec::new();
        if base.is_dir() {
            for entry in std::fs::read_dir(&base)? {
                let path = entry?.path();
                if path.is_dir() {
                    dirs.push(path);
                }
            }
            dirs.sort();
        }
        Ok(dirs)
    } else {
        Ok(vec![checkout.join(member)])
    }
}

/// Order crates so every crate appears after all of its dependencies that
/// are in the set. Rounds of simultaneously-ready crates keep their input
/// order, which makes the result deterministic.
pub(crate) fn publish_order(crates: Vec<WorkspaceCrate>) -> Vec<WorkspaceCrate> {
    let names: HashSet<String> = crates.iter().map(|c| c.name.clone()).collect();
    let mut remaining = crates;
    let mut ordered = Vec::new();
    let mut published: HashSet<String> = HashSet::new();

    while !remaining.is_empty() {
        let (ready, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|c| {
            c.dependencies
                .iter()
                .filter(|dep| names.contains(*dep))
                .all(|dep| published.contains(dep))
        });

        if ready.is_empty() {
            // Unreachable for valid manifests (cargo rejects cycles); bail
            // rather than spin.
            tracing::warn!("dependency cycle among workspace crates, publishing remainder as-is");
            ordered.extend(rest);
            break;
        }

        published.extend(ready.iter().map(|c| c.name.clone()));
        ordered.extend(ready);
        remaining = rest;
    }

    ordered
}

#[async_trait]
impl Target for CratesTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let Some(token) = optional_env("CARGO_REGISTRY_TOKEN") else {
            tracing::info!("skipping crates target: CARGO_REGISTRY_TOKEN is not set");
            return Ok(());
        };
        let cargo_bin = optional_env("CARGO_BIN").unwrap_or_else(|| "cargo".to_string());

        let checkout = ctx.workspace.join(format!("{}-src", ctx.repo.repo));
        let clone_url = format!("https://github.com/{}/{}.git", ctx.repo.owner, ctx.repo.repo);
        let checkout_str = checkout.to_string_lossy().to_string();

        process::spawn(
            "git",
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                &ctx.tag.ref_name,
                &clone_url,
                &checkout_str,
            ],
            &SpawnOptions::default(),
        )
        .await?;

        if !checkout.join("Cargo.toml").is_file() {
            if !dry_run::should_perform() {
                tracing::info!("[dry-run] skipping workspace analysis, nothing was cloned");
                return Ok(());
            }
            return Err(Error::Config(format!(
                "checkout of {} has no Cargo.toml",
                ctx.repo
            )));
        }

        let crates = collect_crates(&checkout)?;
        if crates.is_empty() {
            tracing::info!("no publishable crates in {}", ctx.repo);
            return Ok(());
        }

        let ordered = publish_order(crates);
        tracing::info!(
            "publishing {} crates in dependency order: {}",
            ordered.len(),
            ordered
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for item in &ordered {
            let manifest_path = item.manifest_path.to_string_lossy().to_string();
            let options = SpawnOptions::default()
                .with_env("CARGO_REGISTRY_TOKEN", &token)
                .with_cwd(&checkout);
            process::spawn(
                &cargo_bin,
                &["publish", "--manifest-path", &manifest_path],
                &options,
            )
            .await?;
            tracing::info!("published crate {}", item.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_crate(name: &str, deps: &[&str]) -> WorkspaceCrate {
        WorkspaceCrate {
            name: name.to_string(),
            manifest_path: PathBuf::from(format!("{name}/Cargo.toml")),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn position(ordered: &[WorkspaceCrate], name: &str) -> usize {
        ordered.iter().position(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_publish_order_dependencies_first() {
        let ordered = publish_order(vec![
            workspace_crate("app", &["core", "util"]),
            workspace_crate("util", &["core"]),
            workspace_crate("core", &[]),
        ]);

        assert!(position(&ordered, "core") < position(&ordered, "util"));
        assert!(position(&ordered, "util") < position(&ordered, "app"));
    }

    #[test]
    fn test_publish_order_ignores_external_dependencies() {
        let ordered = publish_order(vec![
            workspace_crate("solo", &["serde", "tokio"]),
        ]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].name, "solo");
    }

    #[test]
    fn test_publish_order_is_deterministic_for_ready_sets() {
        let input = vec![
            workspace_crate("b", &[]),
            workspace_crate("a", &[]),
            workspace_crate("c", &["b"]),
        ];
        let ordered = publish_order(input);
        let names: Vec<_> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_publish_order_every_edge_respected() {
        let ordered = publish_order(vec![
            workspace_crate("d", &["c"]),
            workspace_crate("c", &["b"]),
            workspace_crate("b", &["a"]),
            workspace_crate("a", &[]),
        ]);
        let names: Vec<_> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
