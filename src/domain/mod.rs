//! Domain Layer
//!
//! Serving graph value objects and the port through which the cache reaches
//! the topology store.
//!
//! - **Topo** (`topo.rs`) - Tablet types, endpoints, keyspace serving config
//! - **Ports** (`ports.rs`) - The `SrvTopoServer` trait
//!
//! # Usage
//!
//! ```ignore
//! use srvtopo_cache::domain::{SrvTopoServer, TabletType};
//!
//! async fn masters<S: SrvTopoServer>(store: &S) -> TopoResult<EndPoints> {
//!     store.get_end_points("cell1", "commerce", "0", TabletType::Master).await
//! }
//! ```

pub mod ports;
pub mod topo;

pub use ports::SrvTopoServer;
pub use topo::{
    EndPoint, EndPoints, KeyRange, KeyspacePartition, ShardReference, ShardingColumnType,
    SrvKeyspace, TabletType, REPLICATION_LAG, REPLICATION_LAG_HIGH,
};
