//! Network registry
//!
//! Maps network ids to their chain family and ClickHouse database target.
//! Built once at start-up from the embedded network list (or an operator
//! supplied file) and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::config::TokenApiConfig;
use crate::error::TokenApiError;
use crate::types::ChainType;

const DEFAULT_NETWORKS: &str = include_str!("../data/networks.json");

/// Connection target for one ClickHouse database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    /// ClickHouse HTTP interface URL
    pub url: String,
    /// Database name
    pub database: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl DatabaseTarget {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Two targets are the same physical database when url and database match
    pub fn same_database(&self, other: &DatabaseTarget) -> bool {
        self.url == other.url && self.database == other.database
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.url.trim_end_matches('/'), self.database)
    }
}

/// A configured network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    pub id: String,
    pub chain_type: ChainType,
    pub target: DatabaseTarget,
}

/// One entry of a network list file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub id: String,
    pub chain_type: ChainType,
    /// Database name override
    #[serde(default)]
    pub database: Option<String>,
    /// ClickHouse URL override
    #[serde(default)]
    pub url: Option<String>,
}

/// A database target and every network reading from it
#[derive(Debug, Clone)]
pub struct TargetGroup {
    pub target: DatabaseTarget,
    pub network_ids: Vec<String>,
}

/// Immutable network id -> descriptor map
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkDescriptor>,
}

impl NetworkRegistry {
    /// Build a registry from descriptors, rejecting duplicate ids
    pub fn new(
        descriptors: impl IntoIterator<Item = NetworkDescriptor>,
    ) -> Result<Self, TokenApiError> {
        let mut networks = BTreeMap::new();
        for descriptor in descriptors {
            if descriptor.id.trim().is_empty() {
                return Err(TokenApiError::ConfigError(
                    "Network id cannot be empty".to_string(),
                ));
            }
            if networks.contains_key(&descriptor.id) {
                return Err(TokenApiError::DuplicateNetwork(descriptor.id));
            }
            networks.insert(descriptor.id.clone(), descriptor);
        }
        Ok(Self { networks })
    }

    /// Build from network specs, filling targets from the configuration
    pub fn from_specs(
        specs: Vec<NetworkSpec>,
        config: &TokenApiConfig,
    ) -> Result<Self, TokenApiError> {
        let descriptors = specs.into_iter().map(|spec| {
            let database = spec
                .database
                .unwrap_or_else(|| config.database_name(&spec.id, spec.chain_type));
            let url = spec.url.unwrap_or_else(|| config.clickhouse_url.clone());
            debug!(network = %spec.id, chain_type = %spec.chain_type, database = %database, "Registering network");
            NetworkDescriptor {
                target: DatabaseTarget::new(
                    url,
                    database,
                    config.clickhouse_username.clone(),
                    config.clickhouse_password.clone(),
                ),
                id: spec.id,
                chain_type: spec.chain_type,
            }
        });
        Self::new(descriptors)
    }

    /// Parse a JSON network list
    pub fn from_json(json: &str, config: &TokenApiConfig) -> Result<Self, TokenApiError> {
        let specs: Vec<NetworkSpec> = serde_json::from_str(json)?;
        Self::from_specs(specs, config)
    }

    /// Load the registry named by the configuration, or the embedded default list
    pub fn from_config(config: &TokenApiConfig) -> Result<Self, TokenApiError> {
        let registry = match &config.networks_file {
            Some(path) => {
                info!("Loading networks from {}", path);
                let json = std::fs::read_to_string(Path::new(path))?;
                Self::from_json(&json, config)?
            }
            None => Self::from_json(DEFAULT_NETWORKS, config)?,
        };
        info!("Network registry loaded with {} networks", registry.len());
        Ok(registry)
    }

    pub fn lookup(&self, network_id: &str) -> Option<&NetworkDescriptor> {
        self.networks.get(network_id)
    }

    /// Networks of one chain family, in id order
    pub fn list(&self, chain_type: ChainType) -> Vec<&NetworkDescriptor> {
        self.networks
            .values()
            .filter(|n| n.chain_type == chain_type)
            .collect()
    }

    /// Every network, in id order
    pub fn all(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }

    /// Distinct database targets, each with the ids of the networks sharing it
    pub fn distinct_targets(&self) -> Vec<TargetGroup> {
        let mut groups: Vec<TargetGroup> = Vec::new();
        for network in self.networks.values() {
            match groups
                .iter_mut()
                .find(|g| g.target.same_database(&network.target))
            {
                Some(group) => group.network_ids.push(network.id.clone()),
                None => groups.push(TargetGroup {
                    target: network.target.clone(),
                    network_ids: vec![network.id.clone()],
                }),
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
