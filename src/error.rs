//! Error types for Mcrelay
//!
//! This module defines the error taxonomy used by the relay core. Access
//! denial is deliberately absent: it is a normal branch, not an error.

use std::io;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading and validating the routing configuration
///
/// A `ConfigError` never installs a partial routing table; the previous
/// table stays authoritative.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read
    #[error("Could not read config {path:?}: {source}")]
    Read {
        /// File that failed to load
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// A configuration file could not be parsed
    #[error("Could not parse config {path:?}: {reason}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A path key does not match the allowed pattern
    #[error("Invalid path found: {0}")]
    InvalidPath(String),

    /// Both a multicast source and an HTTP url were configured
    #[error("Source {0} must use either a multicast source or an HTTP url, not both")]
    AmbiguousSource(String),

    /// Neither a multicast source nor an HTTP url was configured
    #[error("Source {0} has neither a multicast source nor an HTTP url")]
    MissingSource(String),

    /// The multicast address is not a parseable IPv4 `ip:port`
    #[error("Invalid ip address in source {path}: {value}")]
    InvalidAddress {
        /// Routed path
        path: String,
        /// Offending value
        value: String,
    },

    /// The port is not numeric or is zero
    #[error("Invalid port in source {path}: {value}")]
    InvalidPort {
        /// Routed path
        path: String,
        /// Offending value
        value: String,
    },

    /// The named interface does not exist on this host
    #[error("Interface for source {path} not found: {interface}")]
    UnknownInterface {
        /// Routed path
        path: String,
        /// Interface name from the config
        interface: String,
    },

    /// The HTTP url is malformed
    #[error("Invalid url in source {path}: {reason}")]
    InvalidUrl {
        /// Routed path
        path: String,
        /// Why the url was rejected
        reason: String,
    },

    /// A source uses an option this relay does not implement
    #[error("Unsupported option in source {path}: {option}")]
    Unsupported {
        /// Routed path
        path: String,
        /// Option name
        option: String,
    },

    /// A network entry carries an invalid CIDR block
    #[error("Invalid network {id}: {reason}")]
    InvalidNetwork {
        /// Network entry id
        id: String,
        /// Parser message
        reason: String,
    },

    /// The host interface list could not be obtained
    #[error("Could not get interfaces list: {0}")]
    InterfaceScan(String),
}

/// Errors raised while acquiring a multicast socket for one request
#[derive(Error, Debug)]
pub enum SocketError {
    /// The group address or port could not be parsed
    #[error("Invalid source address: {0}")]
    AddressInvalid(String),

    /// The datagram socket could not be created or configured
    #[error("Cannot create socket: {0}")]
    Create(#[source] io::Error),

    /// The socket could not be bound to the group address
    #[error("Cannot bind socket to {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on
        addr: SocketAddrV4,
        /// Underlying IO error
        source: io::Error,
    },

    /// The interface could not be resolved to an index
    #[error("Interface not found: {interface}: {source}")]
    InterfaceNotFound {
        /// Interface name
        interface: String,
        /// Underlying IO error
        source: io::Error,
    },

    /// The multicast group join failed
    #[error("Failed to join multicast group {group} on {interface}: {source}")]
    Join {
        /// Multicast group
        group: SocketAddrV4,
        /// Interface name
        interface: String,
        /// Underlying IO error
        source: io::Error,
    },
}

/// Errors that end an active relay session
#[derive(Error, Debug)]
pub enum StreamError {
    /// Reading from the packet source or upstream body failed
    #[error("Failed to read from stream: {0}")]
    Read(#[source] io::Error),
}

/// Umbrella error for a single relay session
#[derive(Error, Debug)]
pub enum RelayError {
    /// Socket acquisition failed
    #[error("Could not get stream source: {0}")]
    Socket(#[from] SocketError),

    /// The upstream HTTP source could not be fetched
    #[error("Failed to open HTTP stream {url}: {reason}")]
    Upstream {
        /// Upstream url
        url: String,
        /// Failure description
        reason: String,
    },

    /// The session failed while streaming
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}
