//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! The cache depends on the topology store only through [`SrvTopoServer`].
//! Adapters in [`crate::adapters`] provide concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                 Port (Trait)                         │    │
//! │  │                 SrvTopoServer                        │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │        InMemoryTopoServer │ FileTopoServer           │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::topo::{EndPoints, SrvKeyspace, TabletType};
use crate::error::TopoResult;

/// Read-only serving graph calls used to resolve serving addresses.
///
/// This is the subset of the topology store that the routing layer needs.
/// Implementations make no caching promises; every call may hit the store.
#[async_trait]
pub trait SrvTopoServer: Send + Sync {
    /// Names of all keyspaces served in a cell.
    async fn get_srv_keyspace_names(&self, cell: &str) -> TopoResult<Vec<String>>;

    /// Serving configuration of one keyspace in a cell.
    async fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<SrvKeyspace>;

    /// Endpoints serving a shard for a tablet type in a cell.
    async fn get_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<EndPoints>;
}

#[async_trait]
impl<T: SrvTopoServer + ?Sized> SrvTopoServer for Arc<T> {
    async fn get_srv_keyspace_names(&self, cell: &str) -> TopoResult<Vec<String>> {
        (**self).get_srv_keyspace_names(cell).await
    }

    async fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<SrvKeyspace> {
        (**self).get_srv_keyspace(cell, keyspace).await
    }

    async fn get_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<EndPoints> {
        (**self)
            .get_end_points(cell, keyspace, shard, tablet_type)
            .await
    }
}
