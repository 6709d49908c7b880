//! # Local LRU+TTL Cache
//!
//! Spec §4.1 "Local variant": LRU with per-entry TTL, capacity and TTL
//! fixed at construction. `get` is itself a mutation (it must update
//! recency), so reads and writes share one exclusive section rather than a
//! reader/writer split — exactly what the spec calls out as sufficient.

use super::{Cache, CacheStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    last_used: u64,
    access_count: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    clock: u64,
}

/// LRU cache with a fixed capacity and a fixed per-entry TTL.
pub struct LocalCache<V> {
    capacity: usize,
    ttl: chrono::Duration,
    inner: Mutex<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> LocalCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(capacity: usize, ttl: std::time::Duration) -> Self {
        Self {
            capacity,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(0)),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Synchronous get, used directly where an async trait object would be
    /// overkill (the hybrid cache's L1 tier calls this, not the trait
    /// method, to avoid an unnecessary `await` on a path that never
    /// suspends).
    pub fn get_sync(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;

        let expired = inner
            .entries
            .get(key)
            .is_some_and(|e| e.expires_at <= now);
        if expired {
            inner.entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                entry.access_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set_sync(&self, key: &str, value: V) {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;
        let expires_at = now + self.ttl;

        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            entry.last_used = tick;
            return;
        }

        if inner.entries.len() >= self.capacity {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                last_used: tick,
                access_count: 0,
            },
        );
    }

    pub fn delete_sync(&self, key: &str) {
        self.inner.lock().entries.remove(key);
    }

    pub fn clear_sync(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<V> Cache<V> for LocalCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: V) {
        self.set_sync(key, value)
    }

    async fn delete(&self, key: &str) {
        self.delete_sync(key)
    }

    async fn clear(&self) {
        self.clear_sync()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_then_get_within_ttl_returns_value() {
        let cache: LocalCache<String> = LocalCache::new(10, Duration::from_secs(3600));
        cache.set_sync("k1", "v1".to_string());
        assert_eq!(cache.get_sync("k1"), Some("v1".to_string()));
    }

    #[test]
    fn test_lru_eviction_order() {
        // spec §8 scenario 4
        let cache: LocalCache<String> = LocalCache::new(3, Duration::from_secs(3600));
        cache.set_sync("p1", "e1".into());
        cache.set_sync("p2", "e2".into());
        cache.set_sync("p3", "e3".into());
        cache.get_sync("p2");
        cache.set_sync("p4", "e4".into());

        assert_eq!(cache.get_sync("p1"), None);
        assert_eq!(cache.get_sync("p2"), Some("e2".into()));
        assert_eq!(cache.get_sync("p3"), Some("e3".into()));
        assert_eq!(cache.get_sync("p4"), Some("e4".into()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache: LocalCache<i32> = LocalCache::new(5, Duration::from_secs(3600));
        for i in 0..100 {
            cache.set_sync(&format!("k{i}"), i);
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_delete_and_clear() {
        let cache: LocalCache<i32> = LocalCache::new(5, Duration::from_secs(3600));
        cache.set_sync("k1", 1);
        cache.delete_sync("k1");
        assert_eq!(cache.get_sync("k1"), None);

        cache.set_sync("k2", 2);
        cache.set_sync("k3", 3);
        cache.clear_sync();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_counts_as_eviction_on_get() {
        let cache: LocalCache<i32> = LocalCache::new(5, Duration::from_millis(1));
        cache.set_sync("k1", 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get_sync("k1"), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_hit_rate_computation() {
        let cache: LocalCache<i32> = LocalCache::new(5, Duration::from_secs(3600));
        cache.set_sync("k1", 1);
        cache.get_sync("k1");
        cache.get_sync("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
