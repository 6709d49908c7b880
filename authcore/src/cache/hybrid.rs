//! # Hybrid Cache
//!
//! Spec §4.1 "Hybrid variant": an L1 local cache in front of an L2
//! distributed cache. `get` checks L1 first, falls through to L2 on miss
//! and promotes the value into L1; `set`/`delete` write through to both.
//! If L2 construction fails at startup the cache degrades to L1-only
//! rather than refusing to start.

use super::{Cache, CacheStats, DistributedCache, LocalCache};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// L1 (local) + L2 (distributed) cache with write-through and promote-on-read.
pub struct HybridCache<V> {
    l1: LocalCache<V>,
    l2: Option<Arc<DistributedCache>>,
}

impl<V> HybridCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    pub fn new(l1: LocalCache<V>, l2: Option<Arc<DistributedCache>>) -> Self {
        Self { l1, l2 }
    }

    /// Builds a hybrid cache, degrading to L1-only if `build_l2` fails —
    /// the distributed tier is a performance optimization, not a
    /// correctness requirement, so its absence must never be fatal.
    pub fn new_with_fallback(
        l1: LocalCache<V>,
        build_l2: impl FnOnce() -> Result<DistributedCache, shared::errors::InfraError>,
    ) -> Self {
        match build_l2() {
            Ok(l2) => Self::new(l1, Some(Arc::new(l2))),
            Err(_) => Self::new(l1, None),
        }
    }

    pub fn is_l2_degraded(&self) -> bool {
        self.l2.is_none()
    }
}

#[async_trait]
impl<V> Cache<V> for HybridCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.l1.get_sync(key) {
            return Some(value);
        }
        let Some(l2) = &self.l2 else {
            return None;
        };
        let value = Cache::<V>::get(l2.as_ref(), key).await?;
        // Promote into L1. The spec explicitly allows L1 and L2 to diverge
        // during this window — a concurrent reader may still observe the L2
        // miss before this completes.
        self.l1.set_sync(key, value.clone());
        Some(value)
    }

    async fn set(&self, key: &str, value: V) {
        self.l1.set_sync(key, value.clone());
        if let Some(l2) = &self.l2 {
            Cache::<V>::set(l2.as_ref(), key, value).await;
        }
    }

    async fn delete(&self, key: &str) {
        self.l1.delete_sync(key);
        if let Some(l2) = &self.l2 {
            Cache::<V>::delete(l2.as_ref(), key).await;
        }
    }

    async fn clear(&self) {
        self.l1.clear_sync();
        // L2 has no safe bulk-clear (see `DistributedCache::clear`); the
        // hybrid's `clear` only guarantees the L1 tier is emptied.
    }

    fn stats(&self) -> CacheStats {
        self.l1.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_l2_degraded_serves_from_l1_only() {
        let cache: HybridCache<String> =
            HybridCache::new(LocalCache::new(10, Duration::from_secs(60)), None);
        assert!(cache.is_l2_degraded());
        Cache::<String>::set(&cache, "k1", "v1".into()).await;
        assert_eq!(Cache::<String>::get(&cache, "k1").await, Some("v1".into()));
    }

    #[tokio::test]
    async fn test_clear_empties_l1() {
        let cache: HybridCache<i32> =
            HybridCache::new(LocalCache::new(10, Duration::from_secs(60)), None);
        Cache::<i32>::set(&cache, "k1", 1).await;
        Cache::<i32>::clear(&cache).await;
        assert_eq!(Cache::<i32>::get(&cache, "k1").await, None);
    }
}
