//! Cache Store Module
//!
//! In-memory TTL store: an LRU-ordered map of entries with lazy expiration
//! on read, hit/miss accounting, pattern purges and an optional byte limit
//! enforced by evicting the least recently used entries.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use lru::LruCache;
use tracing::{debug, info, warn};

use crate::cache::entry::{current_timestamp_ms, Weigh};
use crate::cache::{CacheBackend, CacheEntry, CacheStats, InvalidationQuery, PatternQuery};
use crate::error::{CacheError, Result};

/// Backend kind reported by [`MemoryStore`].
pub const MEMORY_CACHE_TYPE: &str = "memory";

/// Default TTL for a memory store: one minute.
pub const DEFAULT_MEMORY_EXPIRES_MS: u64 = 60_000;

// == Slot ==
#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    weight: usize,
}

// == Store State ==
/// Everything guarded by the store mutex.
///
/// The map is unbounded; the byte limit decides when to pop from its cold
/// end.
#[derive(Debug)]
struct StoreState<V> {
    entries: LruCache<String, Slot<V>>,
    stats: CacheStats,
    default_ttl_ms: u64,
    size_limit_bytes: Option<usize>,
    used_bytes: usize,
}

impl<V> StoreState<V> {
    fn remove(&mut self, key: &str) -> Option<Slot<V>> {
        let slot = self.entries.pop(key)?;
        self.used_bytes = self.used_bytes.saturating_sub(slot.weight);
        Some(slot)
    }

    /// Evicts least recently used entries until `incoming` more bytes fit.
    fn make_room(&mut self, limit: usize, incoming: usize) {
        while self.used_bytes + incoming > limit {
            let Some((victim, slot)) = self.entries.pop_lru() else {
                break;
            };
            self.used_bytes = self.used_bytes.saturating_sub(slot.weight);
            self.stats.record_eviction();
            debug!(key = %victim, bytes = slot.weight, "evicted entry to respect byte limit");
        }
    }
}

// == Memory Store ==
/// Thread-safe in-memory TTL store.
///
/// All state sits behind one mutex, so each key's history is linearizable
/// and the counters never drift from the map. The lock is never held across
/// an `.await`.
#[derive(Debug)]
pub struct MemoryStore<V> {
    prefix: String,
    state: Mutex<StoreState<V>>,
}

impl<V> MemoryStore<V>
where
    V: Clone + Weigh + Send + 'static,
{
    // == Constructor ==
    /// Creates a store whose keys live under `prefix`.
    ///
    /// # Arguments
    /// * `prefix` - Namespace token contained in every key of this store
    /// * `default_ttl_ms` - TTL applied when `set` gets no override
    pub fn new(prefix: impl Into<String>, default_ttl_ms: u64) -> Self {
        Self {
            prefix: prefix.into(),
            state: Mutex::new(StoreState {
                entries: LruCache::unbounded(),
                stats: CacheStats::new(),
                default_ttl_ms,
                size_limit_bytes: None,
                used_bytes: 0,
            }),
        }
    }

    /// Enables LRU eviction once stored values exceed `limit` bytes.
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        if let Ok(state) = self.state.get_mut() {
            state.size_limit_bytes = Some(limit);
        }
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn lock(&self, op: &'static str) -> Result<MutexGuard<'_, StoreState<V>>> {
        self.state.lock().map_err(|_| {
            warn!(op, prefix = %self.prefix, "memory store lock poisoned");
            CacheError::StoreFailure(format!("{} store lock poisoned during {op}", self.prefix))
        })
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired.
    ///
    /// Expired entries are removed on the spot and counted as misses. A hit
    /// marks the entry most recently used.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let mut state = self.lock("get")?;
        let now = current_timestamp_ms();

        // None: absent, Some(None): expired, Some(Some(_)): live
        let found = state.entries.get(key).map(|slot| {
            (!slot.entry.is_expired_at(now)).then(|| slot.entry.value.clone())
        });

        match found {
            Some(Some(value)) => {
                state.stats.record_hit();
                Ok(Some(value))
            }
            Some(None) => {
                state.remove(key);
                debug!(key, "purged expired entry on read");
                state.stats.record_miss();
                Ok(None)
            }
            None => {
                state.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// Returns the TTL applied in milliseconds. A TTL of 0 stores an entry
    /// that is already expired.
    pub fn set(&self, key: &str, value: V, ttl_ms: Option<u64>) -> Result<u64> {
        let mut state = self.lock("set")?;
        let ttl = ttl_ms.unwrap_or(state.default_ttl_ms);

        let weight = match state.size_limit_bytes {
            Some(limit) => {
                let weight = value.weight();
                if weight > limit {
                    return Err(CacheError::CacheFull(format!(
                        "entry `{key}` is {weight} bytes, limit is {limit}"
                    )));
                }
                state.remove(key);
                state.make_room(limit, weight);
                weight
            }
            None => {
                state.remove(key);
                0
            }
        };

        state.used_bytes += weight;
        state.entries.put(
            key.to_string(),
            Slot {
                entry: CacheEntry::new(value, ttl),
                weight,
            },
        );

        debug!(key, ttl_ms = ttl, "stored entry");
        Ok(ttl)
    }

    // == Delete ==
    /// Removes `key`; returns whether an entry existed.
    ///
    /// Deleting an absent key is not an error.
    pub fn del(&self, key: &str) -> Result<bool> {
        let mut state = self.lock("del")?;
        Ok(state.remove(key).is_some())
    }

    // == Invalidate ==
    /// Point or pattern purge.
    ///
    /// Pattern purges scan every entry under the lock, so they are linear in
    /// the store size. Expired entries met during the scan are dropped but
    /// not counted.
    pub fn invalidate(&self, query: &InvalidationQuery) -> Result<usize> {
        match query {
            InvalidationQuery::Key { key } => Ok(usize::from(self.del(key)?)),
            InvalidationQuery::Pattern(pattern) => self.invalidate_pattern(pattern),
        }
    }

    fn invalidate_pattern(&self, pattern: &PatternQuery) -> Result<usize> {
        let matcher = pattern.compile(&self.prefix)?;
        let mut state = self.lock("invalidate")?;
        let now = current_timestamp_ms();

        let mut matched = Vec::new();
        let mut stale = Vec::new();
        for (key, slot) in state.entries.iter() {
            if slot.entry.is_expired_at(now) {
                stale.push(key.clone());
            } else if matcher.matches(key) {
                matched.push(key.clone());
            }
        }

        for key in stale.iter().chain(&matched) {
            state.remove(key);
        }

        info!(
            prefix = %self.prefix,
            purged = matched.len(),
            expired = stale.len(),
            "pattern invalidation complete"
        );
        Ok(matched.len())
    }

    // == Clear ==
    /// Removes every entry. Hit, miss and eviction counters are kept.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock("clear")?;
        state.entries.clear();
        state.used_bytes = 0;
        info!(prefix = %self.prefix, "memory store cleared");
        Ok(())
    }

    // == Cleanup Expired ==
    /// Removes all expired entries; returns how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut state = self.lock("cleanup_expired")?;
        let now = current_timestamp_ms();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        Ok(expired.len())
    }

    /// Snapshot of the keys currently held, expired or not.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .lock("keys")?
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect())
    }

    pub fn set_expires(&self, ttl_ms: u64) -> Result<()> {
        self.lock("set_expires")?.default_ttl_ms = ttl_ms;
        Ok(())
    }

    // == Accounting ==
    pub fn stats(&self) -> Result<CacheStats> {
        let state = self.lock("stats")?;
        let mut stats = state.stats;
        stats.set_size(state.entries.len());
        Ok(stats)
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.lock("size")?.entries.len())
    }

    pub fn hits(&self) -> Result<u64> {
        Ok(self.lock("hits")?.stats.hits)
    }

    pub fn misses(&self) -> Result<u64> {
        Ok(self.lock("misses")?.stats.misses)
    }

    /// Bytes currently accounted against the size limit.
    pub fn used_bytes(&self) -> Result<usize> {
        Ok(self.lock("used_bytes")?.used_bytes)
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryStore<V>
where
    V: Clone + Weigh + Send + Sync + 'static,
{
    fn cache_type(&self) -> &str {
        MEMORY_CACHE_TYPE
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<V>> {
        MemoryStore::get(self, key)
    }

    async fn set(&self, key: &str, value: V, ttl_ms: Option<u64>) -> Result<u64> {
        MemoryStore::set(self, key, value, ttl_ms)
    }

    async fn del(&self, query: &InvalidationQuery) -> Result<usize> {
        self.invalidate(query)
    }

    async fn clear_cache(&self) -> Result<()> {
        self.clear()
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.cleanup_expired()
    }

    async fn stats(&self) -> Result<CacheStats> {
        MemoryStore::stats(self)
    }

    async fn set_expires(&self, ttl_ms: u64) -> Result<()> {
        MemoryStore::set_expires(self, ttl_ms)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    fn store() -> MemoryStore<String> {
        MemoryStore::new("data", 300_000)
    }

    #[test]
    fn test_store_set_and_get() {
        let store = store();

        let ttl = store.set("data:key1", "value1".to_string(), None).unwrap();

        assert_eq!(ttl, 300_000);
        assert_eq!(store.get("data:key1").unwrap(), Some("value1".to_string()));
        assert_eq!(store.size().unwrap(), 1);
        assert_eq!(store.hits().unwrap(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = store();

        assert_eq!(store.get("data:nope").unwrap(), None);
        assert_eq!(store.misses().unwrap(), 1);
        assert_eq!(store.hits().unwrap(), 0);
    }

    #[test]
    fn test_store_overwrite_does_not_double_count() {
        let store = store();

        store.set("data:key1", "value1".to_string(), None).unwrap();
        store.set("data:key1", "value2".to_string(), None).unwrap();

        assert_eq!(store.get("data:key1").unwrap(), Some("value2".to_string()));
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_store_delete() {
        let store = store();
        store.set("data:key1", "value1".to_string(), None).unwrap();

        assert!(store.del("data:key1").unwrap());
        assert_eq!(store.size().unwrap(), 0);
        assert!(!store.del("data:key1").unwrap());
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_zero_ttl_is_a_miss() {
        let store = store();

        assert_eq!(store.set("data:k", "v".to_string(), Some(0)).unwrap(), 0);
        assert_eq!(store.get("data:k").unwrap(), None);
        assert_eq!(store.misses().unwrap(), 1);
        assert_eq!(store.size().unwrap(), 0, "expired entry purged on read");
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = store();
        store.set("data:k", "v".to_string(), Some(50)).unwrap();

        assert!(store.get("data:k").unwrap().is_some());
        sleep(Duration::from_millis(80));
        assert!(store.get("data:k").unwrap().is_none());
    }

    #[test]
    fn test_set_expires_changes_default() {
        let store = store();
        store.set_expires(1_000).unwrap();
        assert_eq!(store.set("data:k", "v".to_string(), None).unwrap(), 1_000);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let store = store();
        store.set("data:a", "1".to_string(), None).unwrap();
        store.set("data:b", "2".to_string(), None).unwrap();
        store.get("data:a").unwrap();
        store.get("data:missing").unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_pattern_invalidation() {
        let store = store();
        for key in ["data:item:42", "data:items", "data:article:7"] {
            store.set(key, "v".to_string(), None).unwrap();
        }

        let purged = store
            .invalidate(&PatternQuery::collection("item").with_entity_id("42").into())
            .unwrap();
        assert_eq!(purged, 1);
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["data:article:7", "data:items"]);

        let purged = store.invalidate(&PatternQuery::plural("items").into()).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.keys().unwrap(), vec!["data:article:7"]);
    }

    #[test]
    fn test_pattern_invalidation_zero_matches() {
        let store = store();
        store.set("data:article:7", "v".to_string(), None).unwrap();

        let purged = store.invalidate(&PatternQuery::plural("items").into()).unwrap();
        assert_eq!(purged, 0);
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_point_invalidation_reports_existence() {
        let store = store();
        store.set("data:item:1", "v".to_string(), None).unwrap();

        assert_eq!(store.invalidate(&InvalidationQuery::key("data:item:1")).unwrap(), 1);
        assert_eq!(store.invalidate(&InvalidationQuery::key("data:item:1")).unwrap(), 0);
    }

    #[test]
    fn test_invalidation_missing_criteria() {
        let store = store();
        let result = store.invalidate(&PatternQuery::collection("item").into());
        assert!(matches!(result, Err(CacheError::MissingCriteria(_))));
    }

    #[test]
    fn test_prefix_required_for_pattern() {
        let store = store();
        store.set("view:items", "v".to_string(), None).unwrap();

        let purged = store.invalidate(&PatternQuery::plural("items").into()).unwrap();
        assert_eq!(purged, 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = store();
        store.set("data:short", "v".to_string(), Some(0)).unwrap();
        store.set("data:long", "v".to_string(), Some(60_000)).unwrap();

        assert_eq!(store.cleanup_expired().unwrap(), 1);
        assert_eq!(store.size().unwrap(), 1);
        assert!(store.get("data:long").unwrap().is_some());
    }

    #[test]
    fn test_size_limit_evicts_least_recently_used() {
        let store = MemoryStore::new("data", 300_000).with_size_limit(10);

        store.set("data:a", "aaaa".to_string(), None).unwrap();
        store.set("data:b", "bbbb".to_string(), None).unwrap();
        // Touch a so that b becomes the eviction candidate
        store.get("data:a").unwrap();
        store.set("data:c", "cccc".to_string(), None).unwrap();

        assert!(store.get("data:a").unwrap().is_some());
        assert!(store.get("data:b").unwrap().is_none());
        assert!(store.get("data:c").unwrap().is_some());
        assert_eq!(store.stats().unwrap().evictions, 1);
        assert_eq!(store.used_bytes().unwrap(), 8);
    }

    #[test]
    fn test_size_limit_replace_reuses_budget() {
        let store = MemoryStore::new("data", 300_000).with_size_limit(10);

        store.set("data:a", "aaaaaaaa".to_string(), None).unwrap();
        store.set("data:a", "bbbbbbbbbb".to_string(), None).unwrap();

        assert_eq!(store.get("data:a").unwrap(), Some("bbbbbbbbbb".to_string()));
        assert_eq!(store.stats().unwrap().evictions, 0);
        assert_eq!(store.used_bytes().unwrap(), 10);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let store = MemoryStore::new("data", 300_000).with_size_limit(4);

        let result = store.set("data:big", "too large".to_string(), None);
        assert!(matches!(result, Err(CacheError::CacheFull(_))));
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_size_limited_store_at_scale() {
        const ENTRIES: usize = 50_000;
        let store = MemoryStore::new("data", 300_000).with_size_limit(30_000_000);

        let started = Instant::now();
        for i in 0..ENTRIES {
            store.set(&format!("data:item-{i}"), format!("value-{i}"), None).unwrap();
        }
        for i in 0..ENTRIES {
            assert!(store.get(&format!("data:item-{i}")).unwrap().is_some());
        }
        let elapsed = started.elapsed();

        let stats = store.stats().unwrap();
        assert_eq!(stats.size, ENTRIES);
        assert_eq!(stats.hits, ENTRIES as u64);
        assert_eq!(stats.evictions, 0);
        // Recency bookkeeping is constant time per access; a linear scan
        // per access takes many seconds at this size
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn test_eviction_order_follows_reads() {
        let store = MemoryStore::new("data", 300_000).with_size_limit(12);
        for key in ["data:a", "data:b", "data:c"] {
            store.set(key, "xxxx".to_string(), None).unwrap();
        }
        store.get("data:a").unwrap();
        store.get("data:b").unwrap();

        store.set("data:d", "xxxx".to_string(), None).unwrap();
        store.set("data:e", "xxxx".to_string(), None).unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["data:b", "data:d", "data:e"]);
        assert_eq!(store.stats().unwrap().evictions, 2);
    }

    #[tokio::test]
    async fn test_backend_interface() {
        let store = store();
        let backend: &dyn CacheBackend<String> = &store;

        assert_eq!(backend.cache_type(), "memory");
        assert_eq!(backend.prefix(), "data");
        backend.set("data:x", "1".to_string(), Some(1_000)).await.unwrap();
        assert_eq!(backend.get("data:x").await.unwrap(), Some("1".to_string()));
        assert_eq!(backend.del(&InvalidationQuery::key("data:x")).await.unwrap(), 1);
        assert_eq!(backend.stats().await.unwrap().size, 0);
    }
}
