//! Cache Table
//!
//! Concurrent map from key to [`CacheEntry`]. The map's shard locks are held
//! only for the lookup or insert; refreshes happen on the returned entry.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use super::entry::CacheEntry;

/// Lookup-or-create table of per-key cache entries.
///
/// Keys are compared whole, so callers key each table on the tuple of
/// request fields rather than a joined string. Entries are never evicted:
/// the key domain is expected to stay small.
#[derive(Debug)]
pub struct CacheTable<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Arc<CacheEntry<V>>>,
}

impl<K: Eq + Hash, V> Default for CacheTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> CacheTable<K, V> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the entry for `key`, inserting an empty one if absent.
    pub fn get_or_create(&self, key: K) -> Arc<CacheEntry<V>> {
        if let Some(entry) = self.entries.get(&key) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(CacheEntry::new()));
        Arc::clone(entry.value())
    }

    /// Number of keys that have been looked up
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Lookup;
    use crate::error::TopoError;
    use std::time::Duration;

    fn key(cell: &str, keyspace: &str) -> (String, String) {
        (cell.to_string(), keyspace.to_string())
    }

    #[test]
    fn test_get_or_create_returns_same_entry() {
        let table: CacheTable<(String, String), u32> = CacheTable::new();
        assert!(table.is_empty());

        let a = table.get_or_create(key("cell1", "ks"));
        let b = table.get_or_create(key("cell1", "ks"));
        let c = table.get_or_create(key("cell2", "ks"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_separator_characters_do_not_merge_keys() {
        let table: CacheTable<(String, String), u32> = CacheTable::new();
        let a = table.get_or_create(key("a", "b:c"));
        let b = table.get_or_create(key("a:b", "c"));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_concurrent_creation_yields_one_entry() {
        let table: Arc<CacheTable<String, u32>> = Arc::new(CacheTable::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.get_or_create("hot".to_string()))
            })
            .collect();
        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(table.len(), 1);
        assert!(entries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_key_does_not_block_other_keys() {
        let table: Arc<CacheTable<String, u32>> = Arc::new(CacheTable::new());
        let ttl = Duration::from_secs(1);

        let hung_table = Arc::clone(&table);
        let hung = tokio::spawn(async move {
            hung_table
                .get_or_create("slow".to_string())
                .get_or_refresh(ttl, || std::future::pending())
                .await
        });
        tokio::task::yield_now().await;

        let other = tokio::time::timeout(
            Duration::from_millis(10),
            table
                .get_or_create("fast".to_string())
                .get_or_refresh(ttl, || async { Ok::<_, TopoError>(5) }),
        )
        .await
        .expect("independent key must not wait on the hung fetch");

        assert_eq!(other, Lookup::Refreshed(5));
        assert!(!hung.is_finished());
        hung.abort();
    }
}
