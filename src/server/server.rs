//! Main server structure
//!
//! Owns the shared state and the listening socket.

use super::handlers::{reload_config, server_status, stream_source, AppState};
use crate::config::{RoutingStore, ServerConfig};
use crate::relay::Relay;
use crate::stats::{StatsCollector, StatsHandle};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Multicast to HTTP relay server
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// State shared with handlers
    state: AppState,
}

impl Server {
    /// Load the routing table and build the server.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        let routes = RoutingStore::load(&config.sources, &config.networks)
            .context("Failed to load initial configuration")?;
        let relay = Relay::new().context("Failed to build HTTP client")?;

        Ok(Self::with_parts(config, Arc::new(routes), relay))
    }

    /// Build a server around an existing routing store and relay
    pub fn with_parts(config: ServerConfig, routes: Arc<RoutingStore>, relay: Relay) -> Self {
        let (stats, _collector) = StatsCollector::spawn();
        let state = AppState {
            routes,
            stats,
            relay,
            fake_stream: config.fake_stream.clone().map(Arc::new),
            started: Instant::now(),
        };
        Server { config, state }
    }

    /// HTTP routes for this server
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        if self.config.enable_web_controls {
            router = router
                .route("/server-status", get(server_status))
                .route("/reload-config", get(reload_config));
        }
        router.fallback(stream_source).with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(self, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        let addr = self.config.listen_addr().map_err(anyhow::Error::msg)?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// Shutdown stops accepting immediately; live streams never finish on
    /// their own, so they are not waited for.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<()> {
        let local = listener.local_addr().context("Listener has no address")?;
        info!("Listening on {}", local);

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        tokio::select! {
            result = axum::serve(listener, app).into_future() => {
                if let Err(e) = result {
                    error!("HTTP server error: {:#}", e);
                    return Err(e).context("HTTP server failed");
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping server");
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Routing table holder
    pub fn routes(&self) -> &Arc<RoutingStore> {
        &self.state.routes
    }

    /// Stream counters
    pub fn stats(&self) -> &StatsHandle {
        &self.state.stats
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
