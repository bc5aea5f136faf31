//! Single-Flight Cache Engine
//!
//! Generic building blocks of the resilient serving graph cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 CacheTable<V>  (DashMap)                      │
//! │   key ──▶ Arc<CacheEntry<V>>     shard lock: lookup/insert    │
//! ├──────────────────────────────────────────────────────────────┤
//! │                 CacheEntry<V>                                 │
//! │   tokio Mutex held across check ─▶ fetch ─▶ store             │
//! │   at most one upstream fetch in flight per key                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are fully independent: a slow fetch for one key never delays
//! lookups of another.

mod entry;
mod table;

pub use entry::{CacheEntry, Lookup};
pub use table::CacheTable;
