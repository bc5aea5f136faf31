//! Cache Entry
//!
//! One slot per key. The entry's own lock is held across the whole
//! read-or-refresh-and-write sequence, including the upstream fetch, so at
//! most one fetch per key is ever in flight.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{TopoError, TopoResult};

/// How a lookup was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Served from cache without an upstream call
    Hit(V),
    /// Fetched from upstream and stored
    Refreshed(V),
    /// Upstream failed; the last good value was served instead
    Stale { value: V, error: TopoError },
    /// Upstream failed and nothing has ever been cached for this key
    Uncached(TopoError),
}

impl<V> Lookup<V> {
    /// The value handed to the caller, if any
    pub fn value(&self) -> Option<&V> {
        match self {
            Lookup::Hit(v) | Lookup::Refreshed(v) | Lookup::Stale { value: v, .. } => Some(v),
            Lookup::Uncached(_) => None,
        }
    }

    /// Drop the provenance and keep only what the caller sees
    pub fn into_result(self) -> TopoResult<V> {
        match self {
            Lookup::Hit(v) | Lookup::Refreshed(v) | Lookup::Stale { value: v, .. } => Ok(v),
            Lookup::Uncached(e) => Err(e),
        }
    }
}

/// Last successfully fetched value and when it was stored
#[derive(Debug)]
struct Slot<V> {
    inserted_at: Instant,
    value: V,
}

#[derive(Debug)]
struct EntryState<V> {
    /// `None` until the first successful fetch; never cleared afterwards
    slot: Option<Slot<V>>,
    /// Failure of the most recent fetch, cleared on success
    last_error: Option<TopoError>,
}

/// Cache slot for a single key.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// Completed fetch attempts. Read before queueing on `state` so a caller
    /// can tell whether a fetch finished while it was waiting.
    attempts: AtomicU64,
    state: Mutex<EntryState<V>>,
}

impl<V> Default for CacheEntry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheEntry<V> {
    /// Create an empty entry
    pub fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            state: Mutex::new(EntryState {
                slot: None,
                last_error: None,
            }),
        }
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Return the cached value if younger than `ttl`, otherwise call `fetch`.
    ///
    /// Callers that queued while another caller's fetch was in flight get
    /// that fetch's outcome instead of fetching again. A failed fetch leaves
    /// the stored value and its timestamp untouched, so the next call retries.
    pub async fn get_or_refresh<F, Fut>(&self, ttl: Duration, fetch: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TopoResult<V>>,
    {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(slot) = &state.slot {
            if slot.inserted_at.elapsed() < ttl {
                return Lookup::Hit(slot.value.clone());
            }
        }

        if self.attempts.load(Ordering::Acquire) != seen {
            return Self::last_outcome(&state);
        }

        let result = fetch().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(value) => {
                state.slot = Some(Slot {
                    inserted_at: Instant::now(),
                    value: value.clone(),
                });
                state.last_error = None;
                Lookup::Refreshed(value)
            }
            Err(error) => {
                state.last_error = Some(error.clone());
                match &state.slot {
                    Some(slot) => Lookup::Stale {
                        value: slot.value.clone(),
                        error,
                    },
                    None => Lookup::Uncached(error),
                }
            }
        }
    }

    fn last_outcome(state: &EntryState<V>) -> Lookup<V> {
        match (&state.slot, &state.last_error) {
            (Some(slot), None) => Lookup::Hit(slot.value.clone()),
            (Some(slot), Some(error)) => Lookup::Stale {
                value: slot.value.clone(),
                error: error.clone(),
            },
            (None, Some(error)) => Lookup::Uncached(error.clone()),
            // attempts only moves after a fetch stored a value or an error
            (None, None) => Lookup::Uncached(TopoError::Interrupted),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
