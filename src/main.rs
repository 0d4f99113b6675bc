//! Mcrelay - Multicast to HTTP Stream Relay
//!
//! This is the main entry point for the Mcrelay application.

use anyhow::Result;
use clap::Parser;
use mcrelay::config::{load_config, Config, ServerConfig};
use mcrelay::server::run_server;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Mcrelay - relay multicast streams to HTTP clients
#[derive(Parser, Debug)]
#[command(name = "mcrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to server configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sources file (path to multicast or HTTP source)
    #[arg(short, long)]
    sources: Option<PathBuf>,

    /// Networks file (network to set ids)
    #[arg(short, long)]
    networks: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Stream served to clients outside the permitted networks
    #[arg(long)]
    fake_stream: Option<PathBuf>,

    /// Expose /server-status and /reload-config
    #[arg(long)]
    enable_web_controls: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

impl Args {
    /// Command line values win over the config file
    fn apply(&self, server: &mut ServerConfig) {
        if let Some(sources) = &self.sources {
            server.sources = sources.clone();
        }
        if let Some(networks) = &self.networks {
            server.networks = networks.clone();
        }
        if let Some(listen) = &self.listen {
            server.listen = listen.clone();
        }
        if let Some(fake_stream) = &self.fake_stream {
            server.fake_stream = Some(fake_stream.clone());
        }
        if self.enable_web_controls {
            server.enable_web_controls = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => Config::default(),
    };
    args.apply(&mut config.server);

    info!("Mcrelay v{}", mcrelay::VERSION);
    info!("Sources: {:?}", config.server.sources);
    info!("Networks: {:?}", config.server.networks);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Received Ctrl+C, shutting down...");
                        }
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM, shutting down...");
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to setup SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Received Ctrl+C, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            // On Windows, only handle Ctrl+C
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    // Run the server
    if let Err(e) = run_server(config, shutdown_rx).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
