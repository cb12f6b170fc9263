//! featscope-explorer - feature exploration service
//!
//! Serves the explorer UI and brokers every request to the Feature Data
//! Service. Configuration comes from command-line flags, environment
//! variables, an optional TOML file and compiled defaults, in that order.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use featscope_common::config::load_config;
use featscope_explorer::client::HttpFeatureClient;
use featscope_explorer::session::{spawn_idle_reaper, SessionSettings};
use featscope_explorer::{build_router, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for featscope-explorer
#[derive(Parser, Debug)]
#[command(name = "featscope-explorer")]
#[command(about = "Browser-based explorer for model features")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "FEATSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "FEATSCOPE_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FEATSCOPE_PORT")]
    port: Option<u16>,

    /// Feature Data Service origin, e.g. http://localhost:5000
    #[arg(long, env = "FEATSCOPE_SERVICE_ORIGIN")]
    service_origin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(origin) = args.service_origin {
        config.service.origin = origin;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting featscope-explorer v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Feature Data Service: {}", config.service.origin);

    let client = HttpFeatureClient::new(
        &config.service.origin,
        Duration::from_secs(config.service.timeout_secs),
    )
    .context("Failed to create Feature Data Service client")?;

    let state = AppState::new(Arc::new(client), SessionSettings::from_config(&config));
    let shutdown = CancellationToken::new();
    let reaper = spawn_idle_reaper(
        Arc::clone(&state.sessions),
        Duration::from_secs(config.server.session_idle_secs),
        shutdown.clone(),
    );
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("featscope-explorer listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!("Idle session reaper ended abnormally: {}", e);
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
