mod changelog;
mod cli;
mod config;
mod dispatcher;
mod dry_run;
mod error;
mod github;
mod process;
mod scheduler;
mod status;
mod stores;
mod tags;
mod targets;
mod utils;
mod version;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::dispatcher::{Dispatcher, Event};
use crate::github::GithubClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.verbose {
        tracing::info!("running shipwright with verbose output");
    }
    if !dry_run::should_perform() {
        tracing::info!("DRY_RUN is set, no side effects will be performed");
    }

    let github = Arc::new(GithubClient::new(args.github_token.clone())?);
    let dispatcher = Arc::new(Dispatcher::new(github));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook", post(webhook))
        .with_state(dispatcher);

    let address = args.bind_address();
    tracing::info!("listening on {}", address);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Webhook deliveries carry the event kind in the `X-GitHub-Event` header
/// and the payload as JSON. Events the engine does not act on are dropped
/// with 204; handled events are processed before responding so the hosting
/// platform's redelivery covers transient failures.
async fn webhook(
    State(dispatcher): State<Arc<Dispatcher>>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let kind = headers
        .get("x-github-event")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(event) = Event::from_webhook(&kind, payload) else {
        return StatusCode::NO_CONTENT;
    };

    match dispatcher.handle(event).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::error!("failed to handle {} event: {}", kind, err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
