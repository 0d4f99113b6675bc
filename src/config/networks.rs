//! Network set types
//!
//! Parses the networks file, which maps a network id to a CIDR block and
//! the set ids that block belongs to.

use super::SetId;
use crate::error::ConfigError;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Networks file contents: network id to entry
pub type NetworksFile = BTreeMap<String, NetworkEntry>;

/// A networks file entry as written on disk
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    /// CIDR block; a bare address is taken as a host route
    pub network: String,

    /// Sets this network belongs to
    #[serde(default)]
    pub sets: Vec<SetId>,
}

impl NetworkEntry {
    /// Parse the network field
    pub fn parse_network(&self) -> Option<IpNet> {
        let value = self.network.trim();
        value
            .parse::<IpNet>()
            .ok()
            .or_else(|| value.parse::<IpAddr>().ok().map(IpNet::from))
    }
}

/// A set id and the networks that carry it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSet {
    /// Set id
    pub id: SetId,
    /// Networks in the set, in file order
    pub networks: Vec<IpNet>,
}

/// Group the networks file by set id.
///
/// A network listed under several sets appears in each of them. Any entry
/// with an unparseable block rejects the whole file.
pub fn network_sets(entries: &NetworksFile) -> Result<Vec<NetworkSet>, ConfigError> {
    let mut sets: BTreeMap<SetId, Vec<IpNet>> = BTreeMap::new();

    for (id, entry) in entries {
        let network = entry
            .parse_network()
            .ok_or_else(|| ConfigError::InvalidNetwork {
                id: id.clone(),
                reason: format!("not a CIDR block: {}", entry.network),
            })?;

        for set in &entry.sets {
            sets.entry(*set).or_default().push(network);
        }
    }

    Ok(sets
        .into_iter()
        .map(|(id, networks)| NetworkSet { id, networks })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(network: &str, sets: &[SetId]) -> NetworkEntry {
        NetworkEntry {
            network: network.to_string(),
            sets: sets.to_vec(),
        }
    }

    #[test]
    fn test_parse_network() {
        assert_eq!(
            entry("10.0.0.0/8", &[]).parse_network(),
            Some("10.0.0.0/8".parse().unwrap())
        );
        assert_eq!(
            entry("192.168.1.7", &[]).parse_network(),
            Some("192.168.1.7/32".parse().unwrap())
        );
        assert_eq!(
            entry("2001:db8::/32", &[]).parse_network(),
            Some("2001:db8::/32".parse().unwrap())
        );
        assert_eq!(entry("10.0.0.0/33", &[]).parse_network(), None);
        assert_eq!(entry("office", &[]).parse_network(), None);
    }

    #[test]
    fn test_network_sets_grouping() {
        let mut file = NetworksFile::new();
        file.insert("a-office".to_string(), entry("10.0.0.0/8", &[1, 2]));
        file.insert("b-lab".to_string(), entry("172.16.0.0/12", &[2]));
        file.insert("c-unused".to_string(), entry("192.168.0.0/16", &[]));

        let sets = network_sets(&file).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].id, 1);
        assert_eq!(sets[0].networks, vec!["10.0.0.0/8".parse::<IpNet>().unwrap()]);
        assert_eq!(sets[1].id, 2);
        assert_eq!(sets[1].networks.len(), 2);
    }

    #[test]
    fn test_network_sets_invalid_entry() {
        let mut file = NetworksFile::new();
        file.insert("good".to_string(), entry("10.0.0.0/8", &[1]));
        file.insert("bad".to_string(), entry("10.0.0.0/99", &[1]));

        let err = network_sets(&file).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNetwork { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_sets_default_empty() {
        let file: NetworksFile = toml::from_str("[office]\nnetwork = \"10.0.0.0/8\"\n").unwrap();
        assert!(file["office"].sets.is_empty());
        assert!(network_sets(&file).unwrap().is_empty());
    }
}
