//! Metrics module
//!
//! Prometheus counters for cache observability.

mod counters;

pub use counters::{
    TopoCacheCounters, CACHED_CATEGORY, COUNTS_METRIC_NAME, ERROR_CATEGORY, QUERY_CATEGORY,
};
