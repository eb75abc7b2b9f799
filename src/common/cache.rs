//! In-memory cache backed by moka.

use moka::sync::Cache;

/// Thread-safe in-memory cache with configurable capacity.
///
/// The console keeps list results here (`MemCache<String, Vec<AccessModel>>`)
/// and drops them on every write to the underlying collection.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.entries.remove(key);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
