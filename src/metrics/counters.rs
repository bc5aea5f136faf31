//! Cache Event Counters
//!
//! Per-instance Prometheus counters recording what the resilient cache did
//! for each lookup.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::error::Result;

/// Counter name exported to Prometheus
pub const COUNTS_METRIC_NAME: &str = "resilient_srv_topo_server_counts";

/// Every lookup
pub const QUERY_CATEGORY: &str = "query";

/// Lookup served a stale value after an upstream failure
pub const CACHED_CATEGORY: &str = "cached";

/// Lookup failed with no cached value to fall back on
pub const ERROR_CATEGORY: &str = "error";

/// Event counters for one cache instance, labelled by `category`.
#[derive(Clone, Debug)]
pub struct TopoCacheCounters {
    counts: IntCounterVec,
    query: IntCounter,
    cached: IntCounter,
    error: IntCounter,
}

impl TopoCacheCounters {
    /// Create unregistered counters, all starting at zero
    pub fn new() -> Result<Self> {
        let counts = IntCounterVec::new(
            Opts::new(
                COUNTS_METRIC_NAME,
                "Resilient serving graph cache events by category",
            ),
            &["category"],
        )?;

        // Resolve the label handles up front so every category is exported
        let query = counts.with_label_values(&[QUERY_CATEGORY]);
        let cached = counts.with_label_values(&[CACHED_CATEGORY]);
        let error = counts.with_label_values(&[ERROR_CATEGORY]);

        Ok(Self {
            counts,
            query,
            cached,
            error,
        })
    }

    /// Register these counters with a Prometheus registry
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.counts.clone()))?;
        Ok(())
    }

    pub fn record_query(&self) {
        self.query.inc();
    }

    pub fn record_cached(&self) {
        self.cached.inc();
    }

    pub fn record_error(&self) {
        self.error.inc();
    }

    pub fn queries(&self) -> u64 {
        self.query.get()
    }

    pub fn cached(&self) -> u64 {
        self.cached.get()
    }

    pub fn errors(&self) -> u64 {
        self.error.get()
    }
}

// =============================================================================
// Tests
// =============================================================================
