//! File-Backed Topology Store
//!
//! Implements the `SrvTopoServer` port by reading a serving graph snapshot
//! from disk. The file is re-read on every call, so edits show up at the
//! cache's next refresh.
//!
//! # Snapshot format
//!
//! ```yaml
//! cells:
//!   cell1:
//!     keyspaces:
//!       commerce:
//!         srv_keyspace:
//!           partitions:
//!             master:
//!               shard_references:
//!                 - name: "0"
//!         shards:
//!           "0":
//!             master:
//!               entries:
//!                 - uid: 100
//!                   host: tablet-100.cell1
//!                   named_port_map: { vt: 15100, mysql: 3306 }
//! ```
//!
//! Files ending in `.json` are parsed as JSON, everything else as YAML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{EndPoints, SrvKeyspace, SrvTopoServer, TabletType};
use crate::error::{TopoError, TopoResult};

/// Whole serving graph as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub cells: BTreeMap<String, CellSnapshot>,
}

/// Serving graph of one cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    #[serde(default)]
    pub keyspaces: BTreeMap<String, KeyspaceSnapshot>,
}

/// Serving config and endpoints of one keyspace in a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srv_keyspace: Option<SrvKeyspace>,

    /// shard name -> tablet type -> endpoints
    #[serde(default)]
    pub shards: BTreeMap<String, BTreeMap<TabletType, EndPoints>>,
}

impl TopologySnapshot {
    /// Decode a snapshot; `.json` paths as JSON, anything else as YAML
    pub fn parse(path: &Path, contents: &str) -> TopoResult<Self> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(contents).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| TopoError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    fn keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<&KeyspaceSnapshot> {
        self.cells
            .get(cell)
            .and_then(|c| c.keyspaces.get(keyspace))
            .ok_or_else(|| TopoError::no_node(format!("/{}/ns/{}", cell, keyspace)))
    }
}

/// Topology store backed by a snapshot file.
#[derive(Debug, Clone)]
pub struct FileTopoServer {
    path: PathBuf,
}

impl FileTopoServer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and decode the snapshot file
    async fn load(&self) -> TopoResult<TopologySnapshot> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TopoError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        TopologySnapshot::parse(&self.path, &contents)
    }
}

#[async_trait]
impl SrvTopoServer for FileTopoServer {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get_srv_keyspace_names(&self, cell: &str) -> TopoResult<Vec<String>> {
        let snapshot = self.load().await?;
        let cell_snapshot = snapshot
            .cells
            .get(cell)
            .ok_or_else(|| TopoError::no_node(format!("/{}/ns", cell)))?;

        debug!(count = cell_snapshot.keyspaces.len(), "read keyspace names");
        Ok(cell_snapshot.keyspaces.keys().cloned().collect())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<SrvKeyspace> {
        let snapshot = self.load().await?;
        snapshot
            .keyspace(cell, keyspace)?
            .srv_keyspace
            .clone()
            .ok_or_else(|| TopoError::no_node(format!("/{}/ns/{}", cell, keyspace)))
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<EndPoints> {
        let snapshot = self.load().await?;
        snapshot
            .keyspace(cell, keyspace)?
            .shards
            .get(shard)
            .and_then(|by_type| by_type.get(&tablet_type))
            .cloned()
            .ok_or_else(|| {
                TopoError::no_node(format!(
                    "/{}/ns/{}/{}/{}",
                    cell, keyspace, shard, tablet_type
                ))
            })
    }
}
