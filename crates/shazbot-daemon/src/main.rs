//! shazbot-daemon: one node of a gossip-membership fleet.
//!
//! Loads configuration from `SHAZBOT_*` environment variables, bootstraps
//! from the directory, serves the gossip/list/control routes, and announces
//! its departure on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shazbot_core::{Engine, EngineConfig};
use shazbot_daemon::{HttpTransport, serve_node};

#[derive(Parser, Debug)]
#[command(name = "shazbot-daemon")]
#[command(about = "Gossip membership node")]
struct Args {
    /// Address to listen on for peer and control requests
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "SHAZBOT_LISTEN")]
    listen: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Respects RUST_LOG, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,shazbot_daemon=debug,shazbot_core=debug"
    } else {
        "info,shazbot_daemon=info,shazbot_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EngineConfig::from_env().context("Invalid configuration")?;

    info!("Starting shazbot-daemon");
    info!("Base URL: {}", config.base_url);
    info!("Listen address: {}", args.listen);

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;

    let transport = Arc::new(HttpTransport::new(config.gossip_secret.clone()));
    let engine = Engine::new(config, transport);

    serve_node(listener, engine, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Daemon shut down");
    Ok(())
}

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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
