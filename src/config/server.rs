//! Server configuration types
//!
//! Defines the process-level settings: where to listen, which config files
//! to route from, and the optional fallback stream.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default listen address
fn default_listen() -> String {
    "0.0.0.0:7979".to_string()
}

/// Default sources config path
fn default_sources() -> PathBuf {
    PathBuf::from("config/sources.toml")
}

/// Default networks config path
fn default_networks() -> PathBuf {
    PathBuf::from("config/networks.toml")
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to listen for clients on (e.g., "0.0.0.0:7979")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// File with path to source mappings
    #[serde(default = "default_sources")]
    pub sources: PathBuf,

    /// File with network to set mappings
    #[serde(default = "default_networks")]
    pub networks: PathBuf,

    /// Stream returned to clients outside the permitted networks
    #[serde(default)]
    pub fake_stream: Option<PathBuf>,

    /// Expose /server-status and /reload-config
    #[serde(default)]
    pub enable_web_controls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            sources: default_sources(),
            networks: default_networks(),
            fake_stream: None,
            enable_web_controls: false,
        }
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        self.listen
            .parse()
            .map_err(|e| format!("Invalid listen address {}: {}", self.listen, e))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr()?;
        if self.sources.as_os_str().is_empty() {
            return Err("Sources config path must not be empty".to_string());
        }
        if self.networks.as_os_str().is_empty() {
            return Err("Networks config path must not be empty".to_string());
        }
        Ok(())
    }
}
