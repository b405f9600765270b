mod commands;
mod config;
mod oauth;
mod platform;
mod poller;
mod server;
mod session;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tubebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration — missing OAuth credentials are fatal.
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration loaded");
    info!("  App URL: {}", config.app_url);
    info!("  Redirect URI: {}", config.redirect_uri());
    info!("  Poll interval: {}s", config.poll_interval_secs);

    let state = AppState::new(config);

    info!("Bot is starting...");
    server::run(state).await?;

    Ok(())
}
