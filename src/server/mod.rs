//! Server module for Mcrelay
//!
//! HTTP front end: routes client requests to relay sessions and exposes
//! the optional web controls.

mod handlers;
#[allow(clippy::module_inception)]
mod server;

pub use handlers::{reload_config, server_status, stream_source, AppState, StatusReport};
pub use server::Server;

use crate::config::{Config, RoutingStore};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Run the server with the given configuration
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = Server::new(config.server)?;
    let _hangup = reload_on_hangup(server.routes().clone());
    server.run(shutdown_rx).await
}

/// Reload the routing table on every SIGHUP
#[cfg(unix)]
pub fn reload_on_hangup(routes: Arc<RoutingStore>) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                warn!("Failed to setup SIGHUP handler: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading config");
            let routes = routes.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || routes.reload()).await {
                warn!("Reload task failed: {}", e);
            }
        }
    })
}

/// Reload is only triggered through the web controls on this platform
#[cfg(not(unix))]
pub fn reload_on_hangup(_routes: Arc<RoutingStore>) -> JoinHandle<()> {
    tokio::spawn(async {})
}
