//! # beamcastd
//!
//! Beamcast signaling server binary — wires configuration, logging, and
//! metrics together and starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use beamcast_server::config::ServerConfig;
use beamcast_server::metrics::install_recorder;
use beamcast_server::server::SignalServer;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Beamcast signaling server.
#[derive(Parser, Debug)]
#[command(name = "beamcastd", about = "WebRTC signaling relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "5001")]
    port: u16,

    /// Directory of static assets to serve (broadcaster/viewer pages).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Seconds between WebSocket pings.
    #[arg(long, default_value = "25")]
    ping_interval: u64,

    /// Seconds of silence before a client is considered gone.
    #[arg(long, default_value = "60")]
    ping_timeout: u64,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            ping_interval_secs: self.ping_interval,
            ping_timeout_secs: self.ping_timeout,
            static_dir: self.static_dir,
            ..ServerConfig::default()
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("beamcastd=info,beamcast_server=info,beamcast_signal=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
            }
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_logging();
    let metrics_handle = install_recorder();

    let config = args.into_config();
    if let Some(dir) = &config.static_dir {
        anyhow::ensure!(
            dir.is_dir(),
            "static dir does not exist: {}",
            dir.display()
        );
    }

    let server = SignalServer::new(config, metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!("Beamcast signaling server listening on http://{addr}");

    shutdown_signal().await?;

    tracing::info!("Shutting down...");
    server.graceful_shutdown(handle, None).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
