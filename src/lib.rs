//! # shipwright
//!
//! An event-driven release automation bot for GitHub repositories.
//!
//! ## Overview
//!
//! shipwright listens to repository webhooks (tag creation, tag deletion,
//! commit-status updates) and, once every required check on a tagged commit
//! is green, publishes the build artifacts associated with that commit to
//! the destinations configured in the repository's `release.yml`.
//!
//! ## How a release happens
//!
//! 1. A `create` event registers the tag and resolves it to a commit.
//! 2. `status` events for that commit are aggregated: only the latest
//!    report per context counts, ignored contexts are dropped.
//! 3. When the aggregate turns green, a release is scheduled after a
//!    debounce window; any further event for the tag resets the window.
//! 4. The dispatch acquires a temp workspace, binds the configured artifact
//!    store, and runs all configured targets in parallel. A failing target
//!    never cancels its peers.
//!
//! ## Dry-run mode
//!
//! With `DRY_RUN=true` every code path still executes, but child processes,
//! mutating GitHub calls and trigger webhooks are replaced by log lines.
//!
//! ## Configuration
//!
//! Repositories opt in with a `release.yml` at their root naming an
//! artifact store and a list of release targets; see [`config`].

/// Changelog section lookup by version
pub mod changelog;

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Per-repository release configuration (`release.yml`)
pub mod config;

/// Webhook event handling and engine orchestration
pub mod dispatcher;

/// Process-wide dry-run switch
pub mod dry_run;

/// Error types and error handling utilities
pub mod error;

/// GitHub API client
pub mod github;

/// Child-process runner with secret scrubbing
pub mod process;

/// Debounced release scheduling and dispatch
pub mod scheduler;

/// Commit-status evaluation
pub mod status;

/// Artifact stores: enumeration and download of build artifacts
pub mod stores;

/// Process-wide tag cache
pub mod tags;

/// Release targets: delivery of artifacts to external destinations
pub mod targets;

/// Temp workspaces and checksums
pub mod utils;

/// Semantic-version extraction
pub mod version;
