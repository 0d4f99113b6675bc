//! # Mcrelay - Multicast to HTTP Stream Relay
//!
//! Mcrelay receives IPv4 multicast UDP streams (typically MPEG transport
//! streams) and re-serves them to HTTP clients. Each configured URL path
//! maps to one multicast group on one interface, or to an upstream HTTP
//! stream, and is only served to clients inside the networks permitted for
//! that source.
//!
//! ## Features
//!
//! - **Per-request sockets**: every client gets its own socket joined to the group
//! - **Network sets**: sources and client networks meet through numeric set ids
//! - **Live reload**: SIGHUP or `/reload-config` swap the routing table atomically
//! - **HTTP upstreams**: sources may also proxy a plain HTTP stream
//! - **Fallback content**: unauthorized clients get a fake stream or 403
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcrelay::config::load_config;
//! use mcrelay::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("mcrelay.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Multicast group -> UDP socket (per client) -> relay task -> HTTP body -> Client
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod config;
pub mod error;
pub mod helper;
pub mod relay;
pub mod server;
pub mod stats;

// Re-export commonly used items
pub use access::can_access;
pub use config::{load_config, Config, RoutingStore, RoutingTable, SourceDescriptor};
pub use error::{ConfigError, RelayError, SocketError, StreamError};
pub use relay::{OutputSink, Relay, StreamEnd};
pub use server::{run_server, Server};
pub use stats::{StatsCollector, StatsHandle};

/// Version of the Mcrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "mcrelay");
    }
}
