//! Configuration module for Mcrelay
//!
//! This module provides the server settings, the sources and networks
//! config models, and the routing table built from them.

mod interfaces;
mod networks;
mod server;
mod sources;
mod table;

pub use interfaces::HostInterfaces;
pub use networks::{network_sets, NetworkEntry, NetworkSet, NetworksFile};
pub use server::{Config, ServerConfig};
pub use sources::{
    validate_sources, MulticastSource, RawSource, SetId, SourceDescriptor, SourceKind, SourcesFile,
};
pub use table::{
    build_routing_table, load_routing_table, load_routing_table_with, merge_configs,
    RoutingStore, RoutingTable,
};

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load server configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse server configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

/// On-disk format of a sources or networks file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON, as written by older deployments
    Json,
    /// TOML
    Toml,
}

impl FileFormat {
    /// Pick the format from the file extension; anything but `.json` is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }
}

/// Read and deserialize a structured config file
pub(crate) fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_structured(path, &content)
}

/// Deserialize config content in the format implied by `path`
pub(crate) fn parse_structured<T: DeserializeOwned>(
    path: &Path,
    content: &str,
) -> Result<T, ConfigError> {
    let parsed = match FileFormat::from_path(path) {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        FileFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:7979");
        assert!(!config.server.enable_web_controls);
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[server]
listen = "127.0.0.1:8080"
sources = "/etc/mcrelay/sources.toml"
networks = "/etc/mcrelay/networks.toml"
fake_stream = "/usr/share/mcrelay/fake.ts"
enable_web_controls = true
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(
            config.server.sources,
            PathBuf::from("/etc/mcrelay/sources.toml")
        );
        assert_eq!(
            config.server.fake_stream,
            Some(PathBuf::from("/usr/share/mcrelay/fake.ts"))
        );
        assert!(config.server.enable_web_controls);
    }

    #[test]
    fn test_shipped_configs_are_valid() {
        let config = parse_config(include_str!("../../config/mcrelay.toml")).unwrap();
        assert!(config.server.validate().is_ok());

        let sources: SourcesFile = parse_structured(
            Path::new("sources.toml"),
            include_str!("../../config/sources.toml"),
        )
        .unwrap();
        let networks: NetworksFile = parse_structured(
            Path::new("networks.toml"),
            include_str!("../../config/networks.toml"),
        )
        .unwrap();

        let interfaces = HostInterfaces::from_entries([("eth0", Some(1500))]);
        let table = build_routing_table(&sources, &networks, interfaces).unwrap();
        assert_eq!(table.paths(), vec!["/channel1", "/channel2", "/radio"]);
        assert_eq!(table.lookup("/channel2").unwrap().networks.len(), 1);
    }

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("urls.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("URLS.JSON")), FileFormat::Json);
        assert_eq!(
            FileFormat::from_path(Path::new("sources.toml")),
            FileFormat::Toml
        );
        assert_eq!(FileFormat::from_path(Path::new("sources")), FileFormat::Toml);
    }

    #[test]
    fn test_parse_structured_json_and_toml() {
        let json: NetworksFile = parse_structured(
            Path::new("networks.json"),
            r#"{"office": {"network": "10.0.0.0/8", "sets": [1]}}"#,
        )
        .unwrap();
        assert_eq!(json["office"].sets, vec![1]);

        let toml: NetworksFile = parse_structured(
            Path::new("networks.toml"),
            "[office]\nnetwork = \"10.0.0.0/8\"\nsets = [1]\n",
        )
        .unwrap();
        assert_eq!(toml["office"].network, "10.0.0.0/8");
    }

    #[test]
    fn test_parse_structured_reports_path() {
        let err = parse_structured::<NetworksFile>(Path::new("broken.json"), "{not json")
            .unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, PathBuf::from("broken.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_structured_missing_file() {
        let err = read_structured::<NetworksFile>(Path::new("/nonexistent/networks.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
