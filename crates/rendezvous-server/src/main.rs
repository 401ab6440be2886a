//! rendezvous-server: WebRTC signaling relay.
//!
//! Accepts WebSocket connections, maps caller-chosen peer identifiers to live
//! sessions, and forwards offers, answers, and ICE candidates between them.

mod config;
mod relay;
mod server;
mod status;
mod transport;

use clap::Parser;
use config::ServerConfig;
use server::RendezvousServer;
use std::path::PathBuf;
use tracing::{error, info};

/// rendezvous-server: WebRTC signaling relay
#[derive(Parser, Debug)]
#[command(name = "rendezvous-server", version, about = "WebRTC signaling relay")]
struct Cli {
    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Signaling (WebSocket) port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// HTTP status port (defaults to port + 1)
    #[arg(long)]
    status_port: Option<u16>,

    /// Config file path
    #[arg(long, default_value = "~/.rendezvous/config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting rendezvous-server");

    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(
        Some(&config_path),
        cli.host.as_deref(),
        cli.port,
        cli.status_port,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = RendezvousServer::new(server_config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("rendezvous-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
