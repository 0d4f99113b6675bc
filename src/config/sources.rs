//! Source descriptor types
//!
//! Parses the sources file (path to upstream mapping) and validates every
//! entry into a [`SourceDescriptor`].

use super::HostInterfaces;
use crate::error::ConfigError;
use crate::helper::split_host_port;
use ipnet::IpNet;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;
use url::Url;

/// Numeric tag linking a source to network sets
pub type SetId = u32;

/// Sources file contents: routed path to raw entry
pub type SourcesFile = BTreeMap<String, RawSource>;

lazy_static! {
    static ref VALID_PATH: Regex = Regex::new(r"^/[a-z0-9_-]+$").expect("valid path pattern");
}

/// A sources file entry as written on disk
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RawSource {
    /// Multicast `ip:port`; an `http(s)://` value is read as the url
    #[serde(default)]
    pub source: Option<String>,

    /// Upstream HTTP url
    #[serde(default)]
    pub url: Option<String>,

    /// NIC name to join the multicast group on
    #[serde(default)]
    pub interface: Option<String>,

    /// Set id
    #[serde(default)]
    pub set: SetId,

    /// Transcoder arguments (not supported)
    #[serde(default, rename = "ffmpeg-args", skip_serializing_if = "Option::is_none")]
    pub ffmpeg_args: Option<String>,
}

/// A multicast group and the interface to receive it on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MulticastSource {
    /// Group address and port
    pub group: SocketAddrV4,
    /// Interface name
    pub interface: String,
}

/// Where a routed path gets its bytes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// UDP multicast group
    Multicast(MulticastSource),
    /// Unicast HTTP stream
    Http(Url),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Multicast(m) => write!(f, "udp://{}@{}", m.group, m.interface),
            SourceKind::Http(url) => write!(f, "{}", url),
        }
    }
}

/// Validated routing entry for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Routed path, e.g. `/channel1`
    pub path: String,
    /// Upstream
    pub kind: SourceKind,
    /// Set id used to derive `networks`
    pub set: SetId,
    /// Networks allowed to access this path; empty until merged
    pub networks: Vec<IpNet>,
}

impl SourceDescriptor {
    /// Whether this source is a multicast group
    pub fn is_multicast(&self) -> bool {
        matches!(self.kind, SourceKind::Multicast(_))
    }
}

/// Check that a routed path matches `^/[a-z0-9_-]+$`
pub fn is_valid_path(path: &str) -> bool {
    VALID_PATH.is_match(path)
}

/// Validate every entry of a sources file.
///
/// The first invalid entry rejects the whole file.
pub fn validate_sources(
    sources: &SourcesFile,
    interfaces: &HostInterfaces,
) -> Result<Vec<SourceDescriptor>, ConfigError> {
    sources
        .iter()
        .map(|(path, raw)| validate_source(path, raw, interfaces))
        .collect()
}

/// Validate one sources file entry
pub fn validate_source(
    path: &str,
    raw: &RawSource,
    interfaces: &HostInterfaces,
) -> Result<SourceDescriptor, ConfigError> {
    if !is_valid_path(path) {
        return Err(ConfigError::InvalidPath(path.to_string()));
    }

    if non_empty(&raw.ffmpeg_args).is_some() {
        return Err(ConfigError::Unsupported {
            path: path.to_string(),
            option: "ffmpeg-args".to_string(),
        });
    }

    let kind = match (non_empty(&raw.source), non_empty(&raw.url)) {
        (Some(_), Some(_)) => return Err(ConfigError::AmbiguousSource(path.to_string())),
        (Some(source), None) if is_http_url(source) => {
            SourceKind::Http(parse_http_url(path, source)?)
        }
        (Some(addr), None) => SourceKind::Multicast(parse_multicast(
            path,
            addr,
            raw.interface.as_deref(),
            interfaces,
        )?),
        (None, Some(url)) => SourceKind::Http(parse_http_url(path, url)?),
        (None, None) => return Err(ConfigError::MissingSource(path.to_string())),
    };

    debug!("Parsed source {} -> {}", path, kind);

    Ok(SourceDescriptor {
        path: path.to_string(),
        kind,
        set: raw.set,
        networks: Vec::new(),
    })
}

fn parse_multicast(
    path: &str,
    addr: &str,
    interface: Option<&str>,
    interfaces: &HostInterfaces,
) -> Result<MulticastSource, ConfigError> {
    let invalid_address = || ConfigError::InvalidAddress {
        path: path.to_string(),
        value: addr.to_string(),
    };

    let (host, port) = split_host_port(addr).ok_or_else(invalid_address)?;
    let ip: Ipv4Addr = host.parse().map_err(|_| invalid_address())?;
    let port: u16 = match port.parse() {
        Ok(port) if port != 0 => port,
        _ => {
            return Err(ConfigError::InvalidPort {
                path: path.to_string(),
                value: port.to_string(),
            })
        }
    };

    let interface = interface.unwrap_or_default();
    if !interfaces.contains(interface) {
        return Err(ConfigError::UnknownInterface {
            path: path.to_string(),
            interface: interface.to_string(),
        });
    }

    Ok(MulticastSource {
        group: SocketAddrV4::new(ip, port),
        interface: interface.to_string(),
    })
}

fn parse_http_url(path: &str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        path: path.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(format!("{}: {}", value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(format!("no host in {}", value)));
    }
    Ok(url)
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
