//! Python-package target.
//!
//! Uploads wheels and source distributions via `twine upload`. Requires
//! `TWINE_USERNAME` and `TWINE_PASSWORD`; the binary can be overridden with
//! `TWINE_BIN`.

use async_trait::async_trait;

use super::{optional_env, Target, TargetContext};
use crate::error::Result;
use crate::process::{self, SpawnOptions};

pub struct PypiTarget;

fn is_python_package(name: &str) -> bool {
    name.ends_with(".whl") || name.ends_with(".zip") || name.ends_with(".tar.gz")
}

#[async_trait]
impl Target for PypiTarget {
    async fn publish(&self, ctx: &TargetContext) -> Result<()> {
        let (Some(username), Some(password)) =
            (optional_env("TWINE_USERNAME"), optional_env("TWINE_PASSWORD"))
        else {
            tracing::info!("skipping pypi target: TWINE_USERNAME/TWINE_PASSWORD are not set");
            return Ok(());
        };
        let twine_bin = optional_env("TWINE_BIN").unwrap_or_else(|| "twine".to_string());

        let files = ctx.store.list_files().await?;
        let packages: Vec<_> = files
            .iter()
            .filter(|file| is_python_package(&file.name))
            .collect();

        if packages.is_empty() {
            tracing::info!("no Python distributions among artifacts, nothing to upload");
            return Ok(());
        }

        let paths = ctx
            .store
            .download_files(&packages.iter().map(|&f| f.clone()).collect::<Vec<_>>())
            .await?;

        let path_strings: Vec<String> = paths
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect();
        let mut args = vec!["upload"];
        args.extend(path_strings.iter().map(|s| s.as_str()));

        let options = SpawnOptions::default()
            .with_env("TWINE_USERNAME", &username)
            .with_env("TWINE_PASSWORD", &password);
        process::spawn(&twine_bin, &args, &options).await?;

        tracing::info!("uploaded {} distributions", paths.len());
        Ok(())
    }
}
