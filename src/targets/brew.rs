//! Homebrew-formula target.
//!
//! Renders a formula from the template in the target options, filling in the
//! version, ref, commit and the sha256 checksum of every artifact, then
//! commits the result to the configured tap repository.
//!
//! ```yaml
//! - name: brew
//!   tap: owner/homebrew-tools
//!   formula: tool
//!   template: >
//!     class Tool < Formula
//!       version "${version}"
//!       sha256 "${checksums.tool-linux-x86_64.tar.gz}"
//!     end
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Target, TargetContext};
use crate::error::{Error, Result};
use crate::tags::RepoKey;
use crate::utils;
use crate::version;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([^}\s]+)\s*\}").expect("placeholder pattern is valid"));

pub struct BrewTarget;

/// Substitute `${name}` placeholders. Unknown names are an error so a typo
/// never ships a half-rendered formula.
fn render_template(template: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |captures: &regex::Captures<'_>| {
        match variables.get(&captures[1]) {
            Some(value) => value.clone(),
            None => {
                missing.push(captures[1].to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::Config(format!(
            "formula template references unknown variables: {}",
            missing.join(", ")
        )))
    }
}

fn parse_tap(tap: &str) -> Result<RepoKey> {
    match tap.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok(RepoKey::new(owner, repo))
        }
        _ => Err(Error::Config(format!(
            "invalid tap `{tap}`, expected owner/repo"
        ))),
    }
}

#[async_trait]
impl Target for BrewTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let Some(template) = ctx.option_str("template") else {
            tracing::info!("skipping brew target: no formula template configured");
            return Ok(());
        };
        let Some(tap) = ctx.option_str("tap") else {
            tracing::info!("skipping brew target: no tap repository configured");
            return Ok(());
        };
        let tap_repo = parse_tap(tap)?;

        let formula = ctx
            .option_str("formula")
            .unwrap_or(ctx.repo.repo.as_str())
            .to_string();
        let default_path = format!("Formula/{formula}.rb");
        let formula_path = ctx
            .option_str("path")
            .unwrap_or(&default_path)
            .to_string();

        let release_version = version::parse(&ctx.tag.ref_name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| ctx.tag.ref_name.clone());

        let mut variables = HashMap::new();
        variables.insert("version".to_string(), release_version.clone());
        variables.insert("ref".to_string(), ctx.tag.ref_name.clone());
        variables.insert("sha".to_string(), ctx.tag.sha.clone());

        let files = ctx.store.list_files().await?;
        for file in &files {
            let path = ctx.store.download_file(file).await?;
            let checksum = utils::calculate_sha256(&path).await?;
            tracing::debug!("checksum {} = {}", file.name, checksum);
            variables.insert(format!("checksums.{}", file.name), checksum);
        }

        let rendered = render_template(template, &variables)?;

        let existing = ctx.github.get_content(&tap_repo, &formula_path, None).await?;
        let message = format!("Update {formula} to {release_version}");
        ctx.github
            .put_file(
                &tap_repo,
                &formula_path,
                &message,
                &rendered,
                existing.as_ref().map(|file| file.sha.as_str()),
            )
            .await?;

        tracing::info!("updated formula {} in {}", formula, tap_repo);
        Ok(())
    }
}
