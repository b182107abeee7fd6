//! Node-package target.
//!
//! Publishes every npm package tarball (`*.tgz`) among the artifacts via
//! `npm publish`. Requires `NPM_TOKEN`; the binary can be overridden with
//! `NPM_BIN`.

use async_trait::async_trait;

use super::{optional_env, Target, TargetContext};
use crate::error::Result;
use crate::process::{self, SpawnOptions};

pub struct NpmTarget;

#[async_trait]
impl Target for NpmTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let Some(token) = optional_env("NPM_TOKEN") else {
            tracing::info!("skipping npm target: NPM_TOKEN is not set");
            return Ok(());
        };
        let npm_bin = optional_env("NPM_BIN").unwrap_or_else(|| "npm".to_string());

        let files = ctx.store.list_files().await?;
        let packages: Vec<_> = files
            .iter()
            .filter(|file| file.name.ends_with(".tgz"))
            .collect();

        if packages.is_empty() {
            tracing::info!("no package tarballs among artifacts, nothing to publish");
            return Ok(());
        }

        let access = ctx.option_str("access").map(|a| a.to_string());

        for file in packages {
            let path = ctx.store.download_file(file).await?;
            let path_str = path.to_string_lossy().to_string();

            let mut args = vec!["publish", path_str.as_str()];
            if let Some(access) = &access {
                args.push("--access");
                args.push(access);
            }

            let options = SpawnOptions::default().with_env("NPM_TOKEN", &token);
            process::spawn(&npm_bin, &args, &options).await?;
            tracing::info!("published {}", file.name);
        }

        Ok(())
    }
}
