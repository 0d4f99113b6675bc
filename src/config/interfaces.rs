//! Host network interface inventory
//!
//! Scanned once per configuration load: interface names for validating
//! sources, and the largest MTU for sizing relay read buffers.

use crate::error::ConfigError;
use crate::helper::buffer_size_for_mtu;
use std::collections::BTreeMap;
use tracing::debug;

/// Interface names and MTUs present on this host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInterfaces {
    /// Interface name to MTU (when known)
    mtus: BTreeMap<String, Option<usize>>,
}

impl HostInterfaces {
    /// Scan the host's current interfaces
    pub fn scan() -> Result<Self, ConfigError> {
        let addrs =
            nix::ifaddrs::getifaddrs().map_err(|e| ConfigError::InterfaceScan(e.to_string()))?;

        let mut mtus = BTreeMap::new();
        for ifaddr in addrs {
            mtus.entry(ifaddr.interface_name)
                .or_insert_with_key(|name| read_mtu(name));
        }

        let interfaces = HostInterfaces { mtus };
        debug!(
            "Found {} interfaces, max MTU {:?}",
            interfaces.len(),
            interfaces.max_mtu()
        );
        Ok(interfaces)
    }

    /// Build an inventory from known `(name, mtu)` pairs
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<usize>)>,
        S: Into<String>,
    {
        HostInterfaces {
            mtus: entries
                .into_iter()
                .map(|(name, mtu)| (name.into(), mtu))
                .collect(),
        }
    }

    /// Whether an interface with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.mtus.contains_key(name)
    }

    /// Interface names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mtus.keys().map(String::as_str)
    }

    /// Number of interfaces
    pub fn len(&self) -> usize {
        self.mtus.len()
    }

    /// Whether no interfaces were found
    pub fn is_empty(&self) -> bool {
        self.mtus.is_empty()
    }

    /// Largest MTU reported by any interface
    pub fn max_mtu(&self) -> Option<usize> {
        self.mtus.values().flatten().copied().max()
    }

    /// Read buffer size for relay sessions
    pub fn buffer_size(&self) -> usize {
        buffer_size_for_mtu(self.max_mtu())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn read_mtu(name: &str) -> Option<usize> {
    std::fs::read_to_string(format!("/sys/class/net/{}/mtu", name))
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn read_mtu(_name: &str) -> Option<usize> {
    None
}
