//! Container-build trigger target.
//!
//! Notifies a container registry build hook that the tag exists; the hook
//! does the actual image build. Requires `DOCKER_TRIGGER_URL`.

use async_trait::async_trait;

use super::{optional_env, Target, TargetContext};
use crate::dry_run;
use crate::error::{Error, Result};

pub struct DockerTarget;

#[async_trait]
impl Target for DockerTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let Some(trigger_url) = optional_env("DOCKER_TRIGGER_URL") else {
            tracing::info!("skipping docker target: DOCKER_TRIGGER_URL is not set");
            return Ok(());
        };

        let payload = serde_json::json!({
            "source_type": "Tag",
            "source_name": ctx.tag.ref_name,
        });

        if !dry_run::should_perform() {
            tracing::info!(
                "[dry-run] would trigger container build for {}:{}",
                ctx.repo,
                ctx.tag.ref_name
            );
            return Ok(());
        }

        tracing::info!(
            "triggering container build for {}:{}",
            ctx.repo,
            ctx.tag.ref_name
        );

        let response = reqwest::Client::new()
            .post(&trigger_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::TriggerFailed(response.status().to_string()));
        }

        Ok(())
    }
}
