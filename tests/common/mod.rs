//! Test utilities for Mcrelay
//!
//! This module provides config-writing helpers and server launchers used
//! across integration tests.

#![allow(dead_code)]

use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use axum::Router;
use mcrelay::config::{
    NetworkEntry, NetworksFile, RawSource, RoutingStore, ServerConfig, SetId, SourcesFile,
};
use mcrelay::relay::{Relay, SocketAcquirer};
use mcrelay::server::Server;
use mcrelay::stats::{StatsHandle, StatsSnapshot};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Config files written to a temporary directory
pub struct TestEnv {
    /// Keeps the files alive
    pub dir: TempDir,
    /// Server settings pointing at the written files
    pub config: ServerConfig,
}

impl TestEnv {
    /// Overwrite the sources file with raw content
    pub fn write_sources(&self, content: &str) {
        std::fs::write(&self.config.sources, content).unwrap();
    }

    /// Overwrite the networks file with raw content
    pub fn write_networks(&self, content: &str) {
        std::fs::write(&self.config.networks, content).unwrap();
    }
}

/// Test configuration builder
#[derive(Default)]
pub struct TestConfigBuilder {
    sources: SourcesFile,
    networks: NetworksFile,
    fake_stream: Option<Vec<u8>>,
    web_controls: bool,
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `path` to an HTTP upstream
    pub fn http_source(mut self, path: &str, url: &str, set: SetId) -> Self {
        self.sources.insert(
            path.to_string(),
            RawSource {
                url: Some(url.to_string()),
                set,
                ..Default::default()
            },
        );
        self
    }

    /// Route `path` to a group on an interface
    pub fn multicast_source(mut self, path: &str, group: &str, interface: &str, set: SetId) -> Self {
        self.sources.insert(
            path.to_string(),
            RawSource {
                source: Some(group.to_string()),
                interface: Some(interface.to_string()),
                set,
                ..Default::default()
            },
        );
        self
    }

    /// Add a client network
    pub fn network(mut self, id: &str, network: &str, sets: &[SetId]) -> Self {
        self.networks.insert(
            id.to_string(),
            NetworkEntry {
                network: network.to_string(),
                sets: sets.to_vec(),
            },
        );
        self
    }

    /// Serve this content to denied clients
    pub fn fake_stream(mut self, content: &[u8]) -> Self {
        self.fake_stream = Some(content.to_vec());
        self
    }

    /// Enable /server-status and /reload-config
    pub fn web_controls(mut self, enabled: bool) -> Self {
        self.web_controls = enabled;
        self
    }

    /// Write the files and build the configuration
    pub fn build(self) -> TestEnv {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources.toml");
        let networks = dir.path().join("networks.toml");

        std::fs::write(&sources, toml::to_string(&self.sources).unwrap()).unwrap();
        std::fs::write(&networks, toml::to_string(&self.networks).unwrap()).unwrap();

        let fake_stream = self.fake_stream.map(|content| {
            let path = dir.path().join("fake.ts");
            std::fs::write(&path, content).unwrap();
            path
        });

        TestEnv {
            config: ServerConfig {
                listen: "127.0.0.1:0".to_string(),
                sources,
                networks,
                fake_stream,
                enable_web_controls: self.web_controls,
            },
            dir,
        }
    }
}

/// A server running on an ephemeral port
pub struct RunningServer {
    /// Listening address
    pub addr: SocketAddr,
    /// Stream counters
    pub stats: StatsHandle,
    /// Routing table holder
    pub routes: Arc<RoutingStore>,
    /// Stops the server when sent to or dropped
    pub shutdown: broadcast::Sender<bool>,
}

impl RunningServer {
    /// Url for a routed path
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// HTTP client that ignores proxy settings from the environment
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Start a server for `config` on 127.0.0.1
pub async fn start_server(config: ServerConfig) -> RunningServer {
    let routes = Arc::new(RoutingStore::load(&config.sources, &config.networks).unwrap());
    let relay = Relay::with_client(
        Arc::new(SocketAcquirer::new().with_bind_device(false)),
        http_client(),
    );
    let server = Server::with_parts(config, routes.clone(), relay);
    let stats = server.stats().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(server.serve(listener, shutdown_rx));

    RunningServer {
        addr,
        stats,
        routes,
        shutdown,
    }
}

/// Start an upstream HTTP server answering `/stream` with `body`
pub async fn start_upstream(body: &'static [u8]) -> SocketAddr {
    let app = Router::new().route(
        "/stream",
        get(move || async move { ([(CONTENT_TYPE, "audio/aac")], body) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Wait until the running stream count equals `running`
pub async fn wait_for_running(stats: &StatsHandle, running: u64) -> StatsSnapshot {
    let mut rx = stats.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = *rx.borrow_and_update();
            if snapshot.running_streams == running {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("stream count did not settle")
}

/// A UDP port that was free a moment ago
pub fn free_udp_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
