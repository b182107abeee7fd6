//! CocoaPods target.
//!
//! Fetches the podspec from the tagged tree and pushes it to the trunk.
//! Requires `COCOAPODS_TRUNK_TOKEN`; the binary can be overridden with
//! `COCOAPODS_BIN`.

use async_trait::async_trait;

use super::{optional_env, Target, TargetContext};
use crate::error::Result;
use crate::process::{self, SpawnOptions};

pub struct CocoapodsTarget;

#[async_trait]
impl Target for CocoapodsTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let Some(token) = optional_env("COCOAPODS_TRUNK_TOKEN") else {
            tracing::info!("skipping cocoapods target: COCOAPODS_TRUNK_TOKEN is not set");
            return Ok(());
        };
        let pod_bin = optional_env("COCOAPODS_BIN").unwrap_or_else(|| "pod".to_string());

        let default_spec = format!("{}.podspec", ctx.repo.repo);
        let spec_path = ctx.option_str("specPath").unwrap_or(&default_spec);

        let Some(file) = ctx
            .github
            .get_content(&ctx.repo, spec_path, Some(&ctx.tag.sha))
            .await?
        else {
            tracing::info!(
                "skipping cocoapods target: {} not found in {}@{}",
                spec_path,
                ctx.repo,
                ctx.tag.ref_name
            );
            return Ok(());
        };

        let spec_name = spec_path.rsplit('/').next().unwrap_or(spec_path);
        let local_spec = ctx.workspace.join(spec_name);
        tokio::fs::write(&local_spec, file.content.as_bytes()).await?;

        let local_spec_str = local_spec.to_string_lossy().to_string();
        let options = SpawnOptions::default().with_env("COCOAPODS_TRUNK_TOKEN", &token);
        process::spawn(&pod_bin, &["trunk", "push", &local_spec_str], &options).await?;

        tracing::info!("pushed {} to trunk", spec_name);
        Ok(())
    }
}
