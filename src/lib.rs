//! srvtopo-cache - Resilient Serving Graph Cache
//!
//! A read-through cache in front of a cluster topology store. It answers the
//! routing layer's serving graph lookups (keyspace names per cell, keyspace
//! serving config, endpoints per shard and tablet type) while bounding the
//! query rate against the store and riding out its transient failures by
//! serving the last known good value.
//!
//! # Architecture
//!
//! ```text
//! caller ─▶ ResilientSrvTopoServer ─▶ CacheTable ─▶ CacheEntry ─▶ SrvTopoServer
//!                 │                    (lookup)     (single-flight   (store)
//!                 └─ HealthFilter on fresh endpoints  refresh)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Topology store implementations (in-memory, file)
//! - [`api`] - HTTP lookup, health and metrics endpoints
//! - [`cache`] - Generic single-flight TTL cache engine
//! - [`domain`] - Serving graph value objects and the store port
//! - [`error`] - Error types
//! - [`health`] - Endpoint health filtering
//! - [`metrics`] - Prometheus event counters
//! - [`resilient`] - The resilient cache itself

pub mod adapters;
pub mod api;
pub mod cache;
pub mod domain;
pub mod error;
pub mod health;
pub mod metrics;
pub mod resilient;

// Re-export commonly used types
pub use domain::{EndPoint, EndPoints, SrvKeyspace, SrvTopoServer, TabletType};
pub use error::{Error, Result, TopoError, TopoResult};
pub use health::filter_unhealthy_servers;
pub use resilient::{CacheStats, ResilientConfig, ResilientSrvTopoServer};
