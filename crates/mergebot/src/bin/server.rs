//! Mergebot service binary.
//!
//! Standalone HTTP service handling GitHub webhooks.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mergebot::{config::Config, github::GitHubClient, server};

/// Run the mergebot webhook server.
#[derive(Parser)]
#[command(name = "mergebot")]
#[command(about = "GitHub bot keeping PR labels and merge gates in sync")]
#[command(version)]
struct Cli {
    /// The port on which to listen
    #[arg(long, env = "PORT", default_value_t = 8075)]
    listen_port: u16,

    /// The GitHub token the bot uses to interact with the API
    #[arg(long, env = "GITHUB_TOKEN")]
    github_token: Option<String>,

    /// The secret key used to validate webhook deliveries
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET")]
    github_secret: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    github_api_url: String,

    /// Whether to output debug logs
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let directive = if cli.debug {
        "mergebot=debug"
    } else {
        "mergebot=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    info!("Starting mergebot server...");

    if cli.github_token.is_none() {
        warn!("No GITHUB_TOKEN configured - API calls will be rejected by GitHub");
    }
    if cli.github_secret.is_none() {
        warn!("No GITHUB_WEBHOOK_SECRET configured - deliveries will not be verified");
    }

    let github = GitHubClient::with_base_url(
        cli.github_token.as_deref().unwrap_or_default(),
        &cli.github_api_url,
    )
    .context("Failed to create GitHub client")?;

    let config = Config {
        port: cli.listen_port,
        github_token: cli.github_token,
        webhook_secret: cli.github_secret,
        api_base_url: cli.github_api_url,
    };

    let state = server::AppState {
        config,
        github: Arc::new(github),
    };
    let app = server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.listen_port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = cli.listen_port, "mergebot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Resolve when the process receives ctrl-c.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
