//! GitHub-release target.
//!
//! Creates (or reuses) the release for the tag and uploads every artifact
//! as a release asset. The release body comes from the changelog section
//! matching the tag's version, when one exists.

use async_trait::async_trait;
use futures_util::future::try_join_all;

use super::{Target, TargetContext};
use crate::error::Result;
use crate::github::{content_type_for, Release};
use crate::{changelog, version};

pub struct GithubTarget;

impl GithubTarget {
    async fn resolve_release(&self, ctx: &TargetContext) -> Result<Release> {
        if let Some(existing) = ctx
            .github
            .get_release_by_tag(&ctx.repo, &ctx.tag.ref_name)
            .await?
        {
            tracing::info!("release {} already exists, reusing it", ctx.tag.ref_name);
            return Ok(existing);
        }

        let changeset = match ctx
            .github
            .get_content(&ctx.repo, &ctx.changelog_path, Some(&ctx.tag.sha))
            .await?
        {
            Some(file) => changelog::find_changeset(&file.content, &ctx.tag.ref_name),
            None => None,
        };

        let name = changeset
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| ctx.tag.ref_name.clone());
        let body = changeset.as_ref().map(|c| c.body.as_str());
        let prerelease = version::parse(&ctx.tag.ref_name)
            .map(|v| v.is_prerelease())
            .unwrap_or(false);

        ctx.github
            .create_release(&ctx.repo, &ctx.tag.ref_name, &name, body, prerelease)
            .await
    }
}

#[async_trait]
impl Target for GithubTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let release = self.resolve_release(ctx).await?;

        let files = ctx.store.list_files().await?;
        if files.is_empty() {
            tracing::info!("no artifacts to upload for {}", ctx.tag.ref_name);
            return Ok(());
        }

        let preserves_type = ctx.store.capabilities().preserves_content_type;

        try_join_all(files.iter().map(|file| {
            let release_id = release.id;
            async move {
                let path = ctx.store.download_file(file).await?;
                let content_type = match (&file.content_type, preserves_type) {
                    (Some(content_type), true) => content_type.as_str(),
                    _ => content_type_for(&path),
                };
                ctx.github
                    .upload_asset(&ctx.repo, release_id, &path, content_type)
                    .await
            }
        }))
        .await?;

        tracing::info!(
            "uploaded {} assets to release {}",
            files.len(),
            ctx.tag.ref_name
        );
        Ok(())
    }
}
