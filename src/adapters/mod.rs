//! Infrastructure Adapters
//!
//! Implementations of the `SrvTopoServer` port, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                  Port (Trait): SrvTopoServer                │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │       InMemoryTopoServer │ FileTopoServer                   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use srvtopo_cache::adapters::FileTopoServer;
//! use srvtopo_cache::{ResilientConfig, ResilientSrvTopoServer};
//!
//! let store = Arc::new(FileTopoServer::new("/etc/srvtopo/topology.yaml"));
//! let cache = ResilientSrvTopoServer::new(store, ResilientConfig::default())?;
//! let names = cache.get_srv_keyspace_names("cell1").await?;
//! ```

mod file;
mod in_memory;

pub use file::{CellSnapshot, FileTopoServer, KeyspaceSnapshot, TopologySnapshot};
pub use in_memory::InMemoryTopoServer;
