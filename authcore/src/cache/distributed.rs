//! # Distributed Cache
//!
//! Spec §4.1 "Distributed variant": namespace-prefixed keys, JSON-serialized
//! values, a single fixed TTL per cache instance. Backed by
//! `shared::redis_client::RedisClient`, grounded in the teacher's own use of
//! that client for its blacklist/refresh-token stores.

use super::{Cache, CacheStats};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared::redis_client::RedisClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache backed by a distributed key-value store, namespaced by prefix.
pub struct DistributedCache {
    client: Arc<RedisClient>,
    prefix: String,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DistributedCache {
    pub fn new(client: Arc<RedisClient>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl<V> Cache<V> for DistributedCache
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let namespaced = self.namespaced(key);
        match self.client.get::<V>(&namespaced).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: V) {
        let namespaced = self.namespaced(key);
        let _ = self.client.set(&namespaced, &value, Some(self.ttl)).await;
    }

    async fn delete(&self, key: &str) {
        let namespaced = self.namespaced(key);
        let _ = self.client.delete(&namespaced).await;
    }

    async fn clear(&self) {
        // Deliberately unsupported: a shared distributed store has no safe
        // "clear everything under this prefix" without a blocking scan, and
        // the spec does not require it for the distributed tier on its own
        // (only the hybrid/local tiers expose a meaningful `clear`).
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: 0,
            entry_count: 0,
        }
    }
}
