//! Dry-run behavior: every code path runs, no side effect leaves the
//! process. These tests set `DRY_RUN` for the whole test binary.

use std::sync::Arc;

use shipwright::github::GithubClient;
use shipwright::process::{self, SpawnOptions};
use shipwright::tags::RepoKey;

fn enable_dry_run() {
    std::env::set_var("DRY_RUN", "true");
}

#[tokio::test]
async fn test_spawn_is_suppressed() {
    enable_dry_run();

    // The command does not exist; in dry-run mode that never matters
    // because nothing is spawned.
    let output = process::spawn(
        "shipwright-no-such-binary",
        &["--flag"],
        &SpawnOptions::default(),
    )
    .await
    .unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_create_release_returns_stub() {
    enable_dry_run();

    let github = GithubClient::new(None).unwrap();
    let repo = RepoKey::new("owner", "repo");

    let release = github
        .create_release(&repo, "v1.0.0", "1.0.0", Some("notes"), false)
        .await
        .unwrap();

    assert_eq!(release.id, 0);
    assert_eq!(release.tag_name, "v1.0.0");
}

#[tokio::test]
async fn test_upload_asset_is_suppressed() {
    enable_dry_run();

    let github = GithubClient::new(None).unwrap();
    let repo = RepoKey::new("owner", "repo");

    // The file does not exist; the dry-run gate short-circuits before any
    // read or request happens.
    github
        .upload_asset(
            &repo,
            0,
            std::path::Path::new("/nonexistent/artifact.tgz"),
            "application/gzip",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_put_file_is_suppressed() {
    enable_dry_run();

    let github = Arc::new(GithubClient::new(None).unwrap());
    let repo = RepoKey::new("owner", "homebrew-tools");

    github
        .put_file(&repo, "Formula/tool.rb", "Update tool", "class Tool; end", None)
        .await
        .unwrap();
}
