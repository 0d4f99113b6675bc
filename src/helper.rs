//! Helper utilities for Mcrelay
//!
//! This module provides common constants and small parsing helpers shared by
//! the config, access and relay modules.

/// Smallest read buffer used by the multicast relay (Ethernet MTU)
pub const DEFAULT_MTU: usize = 1500;

/// Capacity of the stats event channel
pub const STATS_CHANNEL_CAPACITY: usize = 10;

/// Number of chunks that may wait between a relay task and the HTTP body
pub const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// Content type used for relayed multicast streams (MPEG transport stream)
pub const MULTICAST_CONTENT_TYPE: &str = "video/mp2t";

/// Split a `host:port` string into its host and port parts.
///
/// Bracketed IPv6 hosts (`[::1]:80`) are unwrapped. Returns `None` when no
/// port separator is present or an unbracketed host contains further colons.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}

/// Buffer size for a relay read: the largest MTU seen, never below 1500
pub fn buffer_size_for_mtu(max_mtu: Option<usize>) -> usize {
    max_mtu.map_or(DEFAULT_MTU, |mtu| mtu.max(DEFAULT_MTU))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_MTU, 1500);
        assert_eq!(STATS_CHANNEL_CAPACITY, 10);
        assert_eq!(MULTICAST_CONTENT_TYPE, "video/mp2t");
    }

    #[test]
    fn test_split_host_port_ipv4() {
        assert_eq!(
            split_host_port("10.1.2.3:54321"),
            Some(("10.1.2.3", "54321"))
        );
        assert_eq!(split_host_port("239.1.1.1:"), Some(("239.1.1.1", "")));
    }

    #[test]
    fn test_split_host_port_ipv6() {
        assert_eq!(split_host_port("[::1]:8080"), Some(("::1", "8080")));
        assert_eq!(split_host_port("[fe80::1]"), None);
        assert_eq!(split_host_port("::1:8080"), None);
    }

    #[test]
    fn test_split_host_port_missing_port() {
        assert_eq!(split_host_port("10.1.2.3"), None);
        assert_eq!(split_host_port(""), None);
    }

    #[test]
    fn test_buffer_size_for_mtu() {
        assert_eq!(buffer_size_for_mtu(None), 1500);
        assert_eq!(buffer_size_for_mtu(Some(576)), 1500);
        assert_eq!(buffer_size_for_mtu(Some(9000)), 9000);
        assert_eq!(buffer_size_for_mtu(Some(65536)), 65536);
    }
}
