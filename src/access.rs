//! Network access matching
//!
//! Decides whether a client may open a stream by testing its address
//! against the permitted networks derived for a source.

use crate::config::SourceDescriptor;
use crate::helper::split_host_port;
use std::net::IpAddr;

/// Tell if a remote `host:port` address may access the given source.
///
/// Malformed addresses never match. An empty permitted list denies
/// everybody.
pub fn can_access(descriptor: &SourceDescriptor, remote_addr: &str) -> bool {
    match parse_remote_ip(remote_addr) {
        Some(ip) => can_access_ip(descriptor, ip),
        None => false,
    }
}

/// Tell if an already parsed client IP may access the given source
pub fn can_access_ip(descriptor: &SourceDescriptor, ip: IpAddr) -> bool {
    let ip = unmap_ipv4(ip);
    descriptor.networks.iter().any(|net| net.contains(&ip))
}

/// Extract the IP part of a `host:port` remote address
pub fn parse_remote_ip(remote_addr: &str) -> Option<IpAddr> {
    let (host, _) = split_host_port(remote_addr)?;
    host.parse().ok()
}

// Dual-stack listeners report IPv4 peers as ::ffff:a.b.c.d
fn unmap_ipv4(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MulticastSource, SourceKind};
    use ipnet::IpNet;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn descriptor(networks: &[&str]) -> SourceDescriptor {
        SourceDescriptor {
            path: "/channel1".to_string(),
            kind: SourceKind::Multicast(MulticastSource {
                group: SocketAddrV4::new(Ipv4Addr::new(239, 1, 1, 1), 5000),
                interface: "eth0".to_string(),
            }),
            set: 1,
            networks: networks
                .iter()
                .map(|n| n.parse::<IpNet>().unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_allowed_inside_network() {
        let desc = descriptor(&["10.0.0.0/8"]);
        assert!(can_access(&desc, "10.1.2.3:54321"));
        assert!(!can_access(&desc, "192.168.1.1:1"));
    }

    #[test]
    fn test_empty_network_list_denies() {
        let desc = descriptor(&[]);
        assert!(!can_access(&desc, "10.1.2.3:54321"));
        assert!(!can_access(&desc, "127.0.0.1:1"));
    }

    #[test]
    fn test_any_of_several_networks() {
        let desc = descriptor(&["192.168.0.0/16", "172.16.0.0/12", "10.0.0.0/8"]);
        assert!(can_access(&desc, "172.20.1.1:80"));
        assert!(can_access(&desc, "10.255.255.255:80"));
        assert!(!can_access(&desc, "8.8.8.8:53"));
    }

    #[test]
    fn test_malformed_remote_denied() {
        let desc = descriptor(&["0.0.0.0/0"]);
        assert!(!can_access(&desc, "not-an-address"));
        assert!(!can_access(&desc, "10.1.2.3"));
        assert!(!can_access(&desc, "host.example:80"));
        assert!(!can_access(&desc, ""));
    }

    #[test]
    fn test_ipv6_client() {
        let desc = descriptor(&["2001:db8::/32"]);
        assert!(can_access(&desc, "[2001:db8::42]:9000"));
        assert!(!can_access(&desc, "[2001:db9::42]:9000"));
        assert!(!can_access(&desc, "10.1.2.3:9000"));
    }

    #[test]
    fn test_ipv4_mapped_client() {
        let desc = descriptor(&["10.0.0.0/8"]);
        assert!(can_access(&desc, "[::ffff:10.1.2.3]:54321"));
        assert!(!can_access(&desc, "[::ffff:192.168.1.1]:54321"));
    }

    #[test]
    fn test_host_route() {
        let desc = descriptor(&["192.168.1.10/32"]);
        assert!(can_access_ip(&desc, "192.168.1.10".parse().unwrap()));
        assert!(!can_access_ip(&desc, "192.168.1.11".parse().unwrap()));
    }

    #[test]
    fn test_parse_remote_ip() {
        assert_eq!(
            parse_remote_ip("10.1.2.3:1"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
        );
        assert_eq!(parse_remote_ip("[::1]:1"), Some("::1".parse().unwrap()));
        assert_eq!(parse_remote_ip("garbage"), None);
    }
}
