//! In-Memory Topology Store
//!
//! Implements the `SrvTopoServer` port over an in-process serving graph.
//! Supports failure injection and artificial latency, and counts calls so
//! callers can observe how often the store is actually queried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{EndPoints, SrvKeyspace, SrvTopoServer, TabletType};
use crate::error::{TopoError, TopoResult};

type KeyspaceKey = (String, String);
type EndPointsKey = (String, String, String, TabletType);

#[derive(Debug, Default)]
struct ServingGraph {
    keyspace_names: HashMap<String, Vec<String>>,
    srv_keyspaces: HashMap<KeyspaceKey, SrvKeyspace>,
    end_points: HashMap<EndPointsKey, EndPoints>,
    /// When set, every call fails with this error
    failure: Option<TopoError>,
    latency: Duration,
}

#[derive(Debug, Default)]
struct CallCounts {
    keyspace_names: AtomicU64,
    srv_keyspace: AtomicU64,
    end_points: AtomicU64,
}

/// In-process serving graph.
#[derive(Debug, Default)]
pub struct InMemoryTopoServer {
    graph: RwLock<ServingGraph>,
    calls: CallCounts,
}

impl InMemoryTopoServer {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_srv_keyspace_names<I, S>(&self, cell: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.graph.write().keyspace_names.insert(
            cell.to_string(),
            names.into_iter().map(Into::into).collect(),
        );
    }

    pub fn set_srv_keyspace(&self, cell: &str, keyspace: &str, srv_keyspace: SrvKeyspace) {
        self.graph
            .write()
            .srv_keyspaces
            .insert((cell.to_string(), keyspace.to_string()), srv_keyspace);
    }

    pub fn set_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        end_points: EndPoints,
    ) {
        self.graph.write().end_points.insert(
            (
                cell.to_string(),
                keyspace.to_string(),
                shard.to_string(),
                tablet_type,
            ),
            end_points,
        );
    }

    /// Make every subsequent call fail with `error`
    pub fn fail_with(&self, error: TopoError) {
        self.graph.write().failure = Some(error);
    }

    /// Stop injecting failures
    pub fn recover(&self) {
        self.graph.write().failure = None;
    }

    /// Delay every call by `latency` before answering
    pub fn set_latency(&self, latency: Duration) {
        self.graph.write().latency = latency;
    }

    pub fn srv_keyspace_names_calls(&self) -> u64 {
        self.calls.keyspace_names.load(Ordering::SeqCst)
    }

    pub fn srv_keyspace_calls(&self) -> u64 {
        self.calls.srv_keyspace.load(Ordering::SeqCst)
    }

    pub fn end_points_calls(&self) -> u64 {
        self.calls.end_points.load(Ordering::SeqCst)
    }

    /// Simulate store latency, then read the graph
    async fn answer<T>(&self, read: impl FnOnce(&ServingGraph) -> TopoResult<T>) -> TopoResult<T> {
        let latency = self.graph.read().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let graph = self.graph.read();
        if let Some(error) = &graph.failure {
            return Err(error.clone());
        }
        read(&graph)
    }
}

#[async_trait]
impl SrvTopoServer for InMemoryTopoServer {
    async fn get_srv_keyspace_names(&self, cell: &str) -> TopoResult<Vec<String>> {
        self.calls.keyspace_names.fetch_add(1, Ordering::SeqCst);
        debug!(cell, "in-memory GetSrvKeyspaceNames");

        self.answer(|graph| {
            graph
                .keyspace_names
                .get(cell)
                .cloned()
                .ok_or_else(|| TopoError::no_node(format!("/{}/ns", cell)))
        })
        .await
    }

    async fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> TopoResult<SrvKeyspace> {
        self.calls.srv_keyspace.fetch_add(1, Ordering::SeqCst);
        debug!(cell, keyspace, "in-memory GetSrvKeyspace");

        self.answer(|graph| {
            graph
                .srv_keyspaces
                .get(&(cell.to_string(), keyspace.to_string()))
                .cloned()
                .ok_or_else(|| TopoError::no_node(format!("/{}/ns/{}", cell, keyspace)))
        })
        .await
    }

    async fn get_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TopoResult<EndPoints> {
        self.calls.end_points.fetch_add(1, Ordering::SeqCst);
        debug!(cell, keyspace, shard, %tablet_type, "in-memory GetEndPoints");

        self.answer(|graph| {
            graph
                .end_points
                .get(&(
                    cell.to_string(),
                    keyspace.to_string(),
                    shard.to_string(),
                    tablet_type,
                ))
                .cloned()
                .ok_or_else(|| {
                    TopoError::no_node(format!(
                        "/{}/ns/{}/{}/{}",
                        cell, keyspace, shard, tablet_type
                    ))
                })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EndPoint;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_returns_what_was_set() {
        let store = InMemoryTopoServer::new();
        store.set_srv_keyspace_names("cell1", ["commerce", "customer"]);
        store.set_end_points(
            "cell1",
            "commerce",
            "0",
            TabletType::Replica,
            EndPoints::new(vec![EndPoint::new(100, "tablet-100")]),
        );

        assert_eq!(
            store.get_srv_keyspace_names("cell1").await.unwrap(),
            vec!["commerce", "customer"]
        );
        let eps = store
            .get_end_points("cell1", "commerce", "0", TabletType::Replica)
            .await
            .unwrap();
        assert_eq!(eps.len(), 1);
        assert_eq!(store.srv_keyspace_names_calls(), 1);
        assert_eq!(store.end_points_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_nodes() {
        let store = InMemoryTopoServer::new();

        assert_matches!(
            store.get_srv_keyspace("cell1", "nope").await,
            Err(TopoError::NoNode { path }) if path == "/cell1/ns/nope"
        );
        assert_matches!(
            store
                .get_end_points("cell1", "ks", "-80", TabletType::Master)
                .await,
            Err(TopoError::NoNode { path }) if path == "/cell1/ns/ks/-80/master"
        );
        assert_eq!(store.srv_keyspace_calls(), 1);
        assert_eq!(store.end_points_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryTopoServer::new();
        store.set_srv_keyspace_names("cell1", ["ks"]);

        store.fail_with(TopoError::Timeout);
        let err = tokio_test::assert_err!(store.get_srv_keyspace_names("cell1").await);
        assert_eq!(err, TopoError::Timeout);

        store.recover();
        tokio_test::assert_ok!(store.get_srv_keyspace_names("cell1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let store = InMemoryTopoServer::new();
        store.set_srv_keyspace_names("cell1", ["ks"]);
        store.set_latency(Duration::from_secs(3));

        let start = tokio::time::Instant::now();
        store.get_srv_keyspace_names("cell1").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
