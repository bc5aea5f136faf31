//! Resilient Serving Graph Cache
//!
//! Wraps a [`SrvTopoServer`] with a cache for two purposes:
//! - limit the QPS to the underlying store
//! - return the last known value of the data if there is an error
//!
//! Errors reach the caller only for keys that have never been fetched
//! successfully.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, instrument, warn};

use crate::cache::{CacheTable, Lookup};
use crate::domain::{EndPoints, SrvKeyspace, SrvTopoServer, TabletType};
use crate::error::{Error, Result, TopoResult};
use crate::health::filter_unhealthy_servers;
use crate::metrics::TopoCacheCounters;

/// Default freshness window for cached entries
pub const DEFAULT_SRV_TOPO_CACHE_TTL: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the resilient cache
#[derive(Debug, Clone)]
pub struct ResilientConfig {
    /// How long to use cached entries before asking the store again
    pub cache_ttl: Duration,
}

impl Default for ResilientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_SRV_TOPO_CACHE_TTL,
        }
    }
}

impl ResilientConfig {
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }
}

/// Snapshot of cache occupancy and event counts
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub srv_keyspace_names_entries: usize,
    pub srv_keyspace_entries: usize,
    pub end_points_entries: usize,
    pub queries: u64,
    pub cached: u64,
    pub errors: u64,
}

// =============================================================================
// Resilient Server
// =============================================================================

/// Caching front for a topology store.
///
/// Each resource kind has its own table; within a table, concurrent lookups
/// of the same stale key share a single upstream fetch.
pub struct ResilientSrvTopoServer {
    topo_server: Arc<dyn SrvTopoServer>,
    config: ResilientConfig,
    counts: TopoCacheCounters,

    srv_keyspace_names_cache: CacheTable<String, Arc<Vec<String>>>,
    srv_keyspace_cache: CacheTable<(String, String), Arc<SrvKeyspace>>,
    end_points_cache: CacheTable<(String, String, String, TabletType), Arc<EndPoints>>,
}

impl ResilientSrvTopoServer {
    /// Create a cache in front of `base`
    pub fn new(base: Arc<dyn SrvTopoServer>, config: ResilientConfig) -> Result<Self> {
        Ok(Self {
            topo_server: base,
            config,
            counts: TopoCacheCounters::new()?,
            srv_keyspace_names_cache: CacheTable::new(),
            srv_keyspace_cache: CacheTable::new(),
            end_points_cache: CacheTable::new(),
        })
    }

    pub fn config(&self) -> &ResilientConfig {
        &self.config
    }

    /// Event counters; register them with a Prometheus registry to export
    pub fn counters(&self) -> &TopoCacheCounters {
        &self.counts
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            srv_keyspace_names_entries: self.srv_keyspace_names_cache.len(),
            srv_keyspace_entries: self.srv_keyspace_cache.len(),
            end_points_entries: self.end_points_cache.len(),
            queries: self.counts.queries(),
            cached: self.counts.cached(),
            errors: self.counts.errors(),
        }
    }

    /// Keyspace names served in `cell`
    #[instrument(skip(self))]
    pub async fn get_srv_keyspace_names(&self, cell: &str) -> Result<Arc<Vec<String>>> {
        let fetch = move || async move {
            self.topo_server
                .get_srv_keyspace_names(cell)
                .await
                .map(Arc::new)
        };

        self.resolve(&self.srv_keyspace_names_cache, cell.to_string(), fetch, || {
            format!("GetSrvKeyspaceNames({})", cell)
        })
        .await
    }

    /// Serving config of `keyspace` in `cell`
    #[instrument(skip(self))]
    pub async fn get_srv_keyspace(&self, cell: &str, keyspace: &str) -> Result<Arc<SrvKeyspace>> {
        let key = (cell.to_string(), keyspace.to_string());
        let fetch = move || async move {
            self.topo_server
                .get_srv_keyspace(cell, keyspace)
                .await
                .map(Arc::new)
        };

        self.resolve(&self.srv_keyspace_cache, key, fetch, || {
            format!("GetSrvKeyspace({}, {})", cell, keyspace)
        })
        .await
    }

    /// Healthy endpoints for a shard and tablet type.
    ///
    /// Filtering happens once per successful fetch, so a stale value keeps
    /// the filtering decision made when it was fetched.
    #[instrument(skip(self))]
    pub async fn get_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Result<Arc<EndPoints>> {
        let key = (
            cell.to_string(),
            keyspace.to_string(),
            shard.to_string(),
            tablet_type,
        );
        let fetch = move || async move {
            self.topo_server
                .get_end_points(cell, keyspace, shard, tablet_type)
                .await
                .map(|end_points| Arc::new(filter_unhealthy_servers(end_points)))
        };

        self.resolve(&self.end_points_cache, key, fetch, || {
            format!(
                "GetEndPoints({}, {}, {}, {})",
                cell, keyspace, shard, tablet_type
            )
        })
        .await
    }

    /// Look up `key` in `table`, refreshing through `fetch` when stale, and
    /// turn the outcome into what the caller sees.
    async fn resolve<K, V, F, Fut>(
        &self,
        table: &CacheTable<K, V>,
        key: K,
        fetch: F,
        resource: impl FnOnce() -> String,
    ) -> Result<V>
    where
        K: Eq + Hash,
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = TopoResult<V>>,
    {
        self.counts.record_query();

        let entry = table.get_or_create(key);
        match entry.get_or_refresh(self.config.cache_ttl, fetch).await {
            Lookup::Hit(value) | Lookup::Refreshed(value) => Ok(value),
            Lookup::Stale { value, error } => {
                self.counts.record_cached();
                warn!("{} failed: {} (returning cached value)", resource(), error);
                Ok(value)
            }
            Lookup::Uncached(source) => {
                self.counts.record_error();
                let resource = resource();
                error!(
                    "{} failed: {} (no cached value, returning error)",
                    resource, source
                );
                Err(Error::Uncached { resource, source })
            }
        }
    }
}

impl std::fmt::Debug for ResilientSrvTopoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientSrvTopoServer")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTopoServer;
    use crate::domain::{EndPoint, REPLICATION_LAG, REPLICATION_LAG_HIGH};
    use crate::error::TopoError;
    use assert_matches::assert_matches;

    fn setup(ttl: Duration) -> (Arc<InMemoryTopoServer>, ResilientSrvTopoServer) {
        let store = Arc::new(InMemoryTopoServer::new());
        let server = ResilientSrvTopoServer::new(
            store.clone(),
            ResilientConfig::default().with_cache_ttl(ttl),
        )
        .unwrap();
        (store, server)
    }

    fn healthy(uid: u32) -> EndPoint {
        EndPoint::new(uid, format!("tablet-{}", uid))
    }

    fn lagging(uid: u32) -> EndPoint {
        healthy(uid).with_health(REPLICATION_LAG, REPLICATION_LAG_HIGH)
    }

    #[test]
    fn test_default_ttl_is_one_second() {
        assert_eq!(ResilientConfig::default().cache_ttl, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_names_are_cached_within_ttl() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_srv_keyspace_names("cell1", ["commerce"]);

        for _ in 0..5 {
            let names = server.get_srv_keyspace_names("cell1").await.unwrap();
            assert_eq!(*names, vec!["commerce".to_string()]);
        }

        assert_eq!(store.srv_keyspace_names_calls(), 1);
        assert_eq!(server.counters().queries(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncached_failure_is_reported() {
        let (store, server) = setup(Duration::from_secs(1));
        store.fail_with(TopoError::Timeout);

        for _ in 0..3 {
            let err = server.get_srv_keyspace("cell1", "ks").await.unwrap_err();
            assert_matches!(
                err,
                Error::Uncached { ref resource, source: TopoError::Timeout }
                    if resource == "GetSrvKeyspace(cell1, ks)"
            );
        }

        assert_eq!(server.counters().errors(), 3);
        assert_eq!(server.counters().cached(), 0);
        assert_eq!(store.srv_keyspace_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_served_until_recovery() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_srv_keyspace("cell1", "ks", SrvKeyspace::default());
        let first = server.get_srv_keyspace("cell1", "ks").await.unwrap();

        store.fail_with(TopoError::Unavailable("zk down".into()));
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(2)).await;
            let served = server.get_srv_keyspace("cell1", "ks").await.unwrap();
            assert!(Arc::ptr_eq(&first, &served));
        }
        assert_eq!(server.counters().cached(), 4);
        assert_eq!(server.counters().errors(), 0);

        let updated = SrvKeyspace {
            sharding_column_name: "user_id".into(),
            ..Default::default()
        };
        store.set_srv_keyspace("cell1", "ks", updated.clone());
        store.recover();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(*server.get_srv_keyspace("cell1", "ks").await.unwrap(), updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_kinds_use_separate_tables() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_srv_keyspace_names("cell1", ["ks"]);
        store.set_srv_keyspace("cell1", "ks", SrvKeyspace::default());
        store.set_end_points(
            "cell1",
            "ks",
            "0",
            TabletType::Master,
            EndPoints::new(vec![healthy(1)]),
        );

        server.get_srv_keyspace_names("cell1").await.unwrap();
        server.get_srv_keyspace("cell1", "ks").await.unwrap();
        server
            .get_end_points("cell1", "ks", "0", TabletType::Master)
            .await
            .unwrap();

        let stats = server.stats();
        assert_eq!(stats.srv_keyspace_names_entries, 1);
        assert_eq!(stats.srv_keyspace_entries, 1);
        assert_eq!(stats.end_points_entries, 1);
        assert_eq!(stats.queries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separators_inside_names_keep_keys_apart() {
        let (store, server) = setup(Duration::from_secs(1));
        let with_column = |column: &str| SrvKeyspace {
            sharding_column_name: column.into(),
            ..Default::default()
        };
        store.set_srv_keyspace("a", "b:c", with_column("first"));
        store.set_srv_keyspace("a:b", "c", with_column("second"));

        let first = server.get_srv_keyspace("a", "b:c").await.unwrap();
        let second = server.get_srv_keyspace("a:b", "c").await.unwrap();

        assert_eq!(first.sharding_column_name, "first");
        assert_eq!(second.sharding_column_name, "second");
        assert_eq!(store.srv_keyspace_calls(), 2);
        assert_eq!(server.stats().srv_keyspace_entries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tablet_types_are_distinct_keys() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_end_points(
            "cell1",
            "ks",
            "0",
            TabletType::Master,
            EndPoints::new(vec![healthy(1)]),
        );
        store.set_end_points(
            "cell1",
            "ks",
            "0",
            TabletType::Replica,
            EndPoints::new(vec![healthy(2), healthy(3)]),
        );

        let master = server
            .get_end_points("cell1", "ks", "0", TabletType::Master)
            .await
            .unwrap();
        let replica = server
            .get_end_points("cell1", "ks", "0", TabletType::Replica)
            .await
            .unwrap();

        assert_eq!(master.len(), 1);
        assert_eq!(replica.len(), 2);
        assert_eq!(store.end_points_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_points_scenario() {
        let ttl = Duration::from_secs(1);
        let (store, server) = setup(ttl);
        let get = || server.get_end_points("cell1", "ks", "0", TabletType::Replica);

        // t=0: fetch [A(healthy)]
        store.set_end_points(
            "cell1",
            "ks",
            "0",
            TabletType::Replica,
            EndPoints::new(vec![healthy(1)]),
        );
        assert_eq!(*get().await.unwrap(), EndPoints::new(vec![healthy(1)]));
        assert_eq!(store.end_points_calls(), 1);

        // t=0.5: served from cache
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(*get().await.unwrap(), EndPoints::new(vec![healthy(1)]));
        assert_eq!(store.end_points_calls(), 1);

        // t=1.2: upstream errors, cached value returned
        tokio::time::advance(Duration::from_millis(700)).await;
        store.fail_with(TopoError::Timeout);
        assert_eq!(*get().await.unwrap(), EndPoints::new(vec![healthy(1)]));
        assert_eq!(store.end_points_calls(), 2);
        assert_eq!(server.counters().cached(), 1);

        // t=2.5: upstream recovers with [A(healthy), B(lagging)], filtered to [A]
        tokio::time::advance(Duration::from_millis(1300)).await;
        store.recover();
        store.set_end_points(
            "cell1",
            "ks",
            "0",
            TabletType::Replica,
            EndPoints::new(vec![healthy(1), lagging(2)]),
        );
        assert_eq!(*get().await.unwrap(), EndPoints::new(vec![healthy(1)]));
        assert_eq!(store.end_points_calls(), 3);

        // The filtered value is now the fallback
        tokio::time::advance(Duration::from_secs(5)).await;
        store.fail_with(TopoError::Timeout);
        assert_eq!(*get().await.unwrap(), EndPoints::new(vec![healthy(1)]));
        assert_eq!(server.counters().cached(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_lagging_end_points_are_kept() {
        let (store, server) = setup(Duration::from_secs(1));
        let all_lagging = EndPoints::new(vec![lagging(1), lagging(2)]);
        store.set_end_points("cell1", "ks", "0", TabletType::Rdonly, all_lagging.clone());

        let served = server
            .get_end_points("cell1", "ks", "0", TabletType::Rdonly)
            .await
            .unwrap();
        assert_eq!(*served, all_lagging);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_issue_one_fetch() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_srv_keyspace_names("cell1", ["ks"]);
        store.set_latency(Duration::from_millis(250));

        let results = futures::future::join_all(
            (0..20).map(|_| server.get_srv_keyspace_names("cell1")),
        )
        .await;

        assert_eq!(store.srv_keyspace_names_calls(), 1);
        let first = results[0].as_ref().unwrap();
        assert!(results
            .iter()
            .all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
        assert_eq!(server.counters().queries(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_on_stale_key_share_failed_refresh() {
        let (store, server) = setup(Duration::from_secs(1));
        store.set_srv_keyspace_names("cell1", ["commerce"]);
        let original = server.get_srv_keyspace_names("cell1").await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        store.fail_with(TopoError::Timeout);
        store.set_latency(Duration::from_millis(250));

        let results = futures::future::join_all(
            (0..12).map(|_| server.get_srv_keyspace_names("cell1")),
        )
        .await;

        assert_eq!(store.srv_keyspace_names_calls(), 2);
        for result in &results {
            assert!(Arc::ptr_eq(result.as_ref().unwrap(), &original));
        }
        assert_eq!(server.counters().cached(), 12);
        assert_eq!(server.counters().errors(), 0);
    }
}
