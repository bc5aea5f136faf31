//! Serving Graph Value Objects
//!
//! Read-only views of the topology store's serving graph: tablet types,
//! endpoints with their health annotations, and per-keyspace serving config.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// Health annotations
// =============================================================================

/// Health map key reporting replication lag
pub const REPLICATION_LAG: &str = "replication_lag";

/// Replication lag value marking an endpoint as lagging
pub const REPLICATION_LAG_HIGH: &str = "high";

// =============================================================================
// Tablet Type
// =============================================================================

/// Serving role of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletType {
    Idle,
    Master,
    Replica,
    Rdonly,
    Batch,
    Spare,
    Experimental,
    Backup,
    Restore,
    Worker,
    Scrap,
}

impl TabletType {
    /// All tablet types, in declaration order
    pub const ALL: [TabletType; 11] = [
        TabletType::Idle,
        TabletType::Master,
        TabletType::Replica,
        TabletType::Rdonly,
        TabletType::Batch,
        TabletType::Spare,
        TabletType::Experimental,
        TabletType::Backup,
        TabletType::Restore,
        TabletType::Worker,
        TabletType::Scrap,
    ];

    /// Lower-case name used in keys and in the serving graph
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletType::Idle => "idle",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Batch => "batch",
            TabletType::Spare => "spare",
            TabletType::Experimental => "experimental",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Worker => "worker",
            TabletType::Scrap => "scrap",
        }
    }
}

impl std::fmt::Display for TabletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabletType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TabletType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidTabletType(s.to_string()))
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// A single serving address for a tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoint {
    /// Tablet uid
    #[serde(default)]
    pub uid: u32,

    /// Host name or address
    pub host: String,

    /// Named ports (e.g. "vt", "mysql")
    #[serde(default)]
    pub named_port_map: BTreeMap<String, u16>,

    /// Health metrics reported for this tablet, keyed by metric name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub health: BTreeMap<String, String>,
}

impl EndPoint {
    /// Create an endpoint with no ports and no health data
    pub fn new(uid: u32, host: impl Into<String>) -> Self {
        Self {
            uid,
            host: host.into(),
            ..Default::default()
        }
    }

    /// Add a named port
    pub fn with_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.named_port_map.insert(name.into(), port);
        self
    }

    /// Add a health metric
    pub fn with_health(mut self, metric: impl Into<String>, value: impl Into<String>) -> Self {
        self.health.insert(metric.into(), value.into());
        self
    }

    /// True when the tablet reports high replication lag
    pub fn is_lagging(&self) -> bool {
        self.health
            .get(REPLICATION_LAG)
            .is_some_and(|v| v == REPLICATION_LAG_HIGH)
    }
}

/// Ordered set of endpoints serving one cell/keyspace/shard/tablet type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoints {
    #[serde(default)]
    pub entries: Vec<EndPoint>,
}

impl EndPoints {
    pub fn new(entries: Vec<EndPoint>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<EndPoint>> for EndPoints {
    fn from(entries: Vec<EndPoint>) -> Self {
        Self { entries }
    }
}

// =============================================================================
// Keyspace serving config
// =============================================================================

/// Key range covered by a shard; empty bounds are open-ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// Reference to one shard inside a keyspace partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReference {
    pub name: String,
    #[serde(default)]
    pub key_range: KeyRange,
}

/// Shards serving one tablet type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspacePartition {
    #[serde(default)]
    pub shard_references: Vec<ShardReference>,
}

/// Column type used for sharding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardingColumnType {
    #[default]
    Unset,
    Uint64,
    Bytes,
}

/// Per-keyspace serving configuration for one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvKeyspace {
    /// Shards serving each tablet type
    #[serde(default)]
    pub partitions: BTreeMap<TabletType, KeyspacePartition>,

    #[serde(default)]
    pub sharding_column_name: String,

    #[serde(default)]
    pub sharding_column_type: ShardingColumnType,

    /// Tablet types redirected to another keyspace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub served_from: BTreeMap<TabletType, String>,

    #[serde(default)]
    pub split_shard_count: u32,
}

impl SrvKeyspace {
    /// Names of the shards serving a tablet type
    pub fn shard_names(&self, tablet_type: TabletType) -> Vec<&str> {
        self.partitions
            .get(&tablet_type)
            .map(|p| p.shard_references.iter().map(|s| s.name.as_str()).collect())
            .unwrap_or_default()
    }
}
