//! Routing table construction and hot reload
//!
//! A [`RoutingTable`] is an immutable snapshot built from the sources and
//! networks files. [`RoutingStore`] publishes the current snapshot and swaps
//! it whole on reload; readers never see a half-built table.

use super::{
    network_sets, read_structured, validate_sources, HostInterfaces, NetworkSet, NetworksFile,
    SourceDescriptor, SourcesFile,
};
use crate::error::ConfigError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Immutable path to source mapping
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Arc<SourceDescriptor>>,
    interfaces: HostInterfaces,
}

impl RoutingTable {
    /// Build a table from merged descriptors and the inventory they were validated against
    pub fn new(descriptors: Vec<SourceDescriptor>, interfaces: HostInterfaces) -> Self {
        let routes = descriptors
            .into_iter()
            .map(|desc| (desc.path.clone(), Arc::new(desc)))
            .collect();
        RoutingTable { routes, interfaces }
    }

    /// Look up the source for a request path
    pub fn lookup(&self, path: &str) -> Option<Arc<SourceDescriptor>> {
        self.routes.get(path).cloned()
    }

    /// Routed paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Interface inventory scanned for this table
    pub fn interfaces(&self) -> &HostInterfaces {
        &self.interfaces
    }

    /// Relay read buffer size for this table
    pub fn buffer_size(&self) -> usize {
        self.interfaces.buffer_size()
    }
}

/// Populate sources with allowed networks based on their set ids
pub fn merge_configs(
    mut sources: Vec<SourceDescriptor>,
    sets: &[NetworkSet],
) -> Vec<SourceDescriptor> {
    for source in &mut sources {
        for set in sets.iter().filter(|set| set.id == source.set) {
            source.networks.extend_from_slice(&set.networks);
        }
    }
    sources
}

/// Validate and merge already parsed sources and networks
pub fn build_routing_table(
    sources: &SourcesFile,
    networks: &NetworksFile,
    interfaces: HostInterfaces,
) -> Result<RoutingTable, ConfigError> {
    let descriptors = validate_sources(sources, &interfaces)?;
    let sets = network_sets(networks)?;
    Ok(RoutingTable::new(merge_configs(descriptors, &sets), interfaces))
}

/// Load both config files against the host's current interfaces
pub fn load_routing_table(
    sources_path: &Path,
    networks_path: &Path,
) -> Result<RoutingTable, ConfigError> {
    load_routing_table_with(sources_path, networks_path, HostInterfaces::scan()?)
}

/// Load both config files against a given interface inventory
pub fn load_routing_table_with(
    sources_path: &Path,
    networks_path: &Path,
    interfaces: HostInterfaces,
) -> Result<RoutingTable, ConfigError> {
    info!("Reading config {:?}", sources_path);
    let sources: SourcesFile = read_structured(sources_path)?;
    info!("Read {} records", sources.len());

    let networks: NetworksFile = read_structured(networks_path)?;
    info!("Read {} networks from {:?}", networks.len(), networks_path);

    build_routing_table(&sources, &networks, interfaces)
}

/// Process-wide holder of the active routing table
#[derive(Debug)]
pub struct RoutingStore {
    sources_path: PathBuf,
    networks_path: PathBuf,
    /// Fixed inventory; scanned on every load when `None`
    interfaces: Option<HostInterfaces>,
    current: RwLock<Arc<RoutingTable>>,
}

impl RoutingStore {
    /// Load the initial table; fails if the configuration is invalid
    pub fn load(
        sources_path: impl Into<PathBuf>,
        networks_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::open(sources_path.into(), networks_path.into(), None)
    }

    /// Load the initial table, validating against a fixed interface inventory
    pub fn load_with_interfaces(
        sources_path: impl Into<PathBuf>,
        networks_path: impl Into<PathBuf>,
        interfaces: HostInterfaces,
    ) -> Result<Self, ConfigError> {
        Self::open(sources_path.into(), networks_path.into(), Some(interfaces))
    }

    fn open(
        sources_path: PathBuf,
        networks_path: PathBuf,
        interfaces: Option<HostInterfaces>,
    ) -> Result<Self, ConfigError> {
        let table = build_from(&sources_path, &networks_path, interfaces.as_ref())?;
        info!("Loaded {} routes", table.len());
        Ok(RoutingStore {
            sources_path,
            networks_path,
            interfaces,
            current: RwLock::new(Arc::new(table)),
        })
    }

    fn build(&self) -> Result<RoutingTable, ConfigError> {
        build_from(
            &self.sources_path,
            &self.networks_path,
            self.interfaces.as_ref(),
        )
    }

    /// Re-read both files and swap the new table in.
    ///
    /// On failure the previous table stays active.
    pub fn reload(&self) -> Result<Arc<RoutingTable>, ConfigError> {
        match self.build() {
            Ok(table) => {
                let table = Arc::new(table);
                *self.current.write() = table.clone();
                info!("Config reloaded, {} routes active", table.len());
                Ok(table)
            }
            Err(e) => {
                warn!("Config not loaded, keeping previous table: {}", e);
                Err(e)
            }
        }
    }

    /// Replace the active table
    pub fn install(&self, table: RoutingTable) {
        *self.current.write() = Arc::new(table);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.current.read().clone()
    }

    /// Look up a path in the current snapshot
    pub fn lookup(&self, path: &str) -> Option<Arc<SourceDescriptor>> {
        self.current.read().lookup(path)
    }

    /// Sources file path
    pub fn sources_path(&self) -> &Path {
        &self.sources_path
    }

    /// Networks file path
    pub fn networks_path(&self) -> &Path {
        &self.networks_path
    }
}

fn build_from(
    sources_path: &Path,
    networks_path: &Path,
    fixed: Option<&HostInterfaces>,
) -> Result<RoutingTable, ConfigError> {
    let interfaces = match fixed {
        Some(fixed) => fixed.clone(),
        None => HostInterfaces::scan()?,
    };
    load_routing_table_with(sources_path, networks_path, interfaces)
}
