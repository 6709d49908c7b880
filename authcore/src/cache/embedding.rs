//! # Embedding Cache
//!
//! Spec §4.1 "Embedding Cache": a specialization keyed by `(policy-id,
//! content-hash)` where the hash travels with the stored value rather than
//! the key. `get` only returns the vector if the caller's hash matches the
//! one the entry was stored under; a mismatch self-invalidates — the stale
//! entry is deleted and the call reports a miss, rather than silently
//! returning data for different content.

use super::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingEntry {
    content_hash: String,
    vector: Vec<f32>,
}

/// Wraps any `Cache<EmbeddingEntry>` variant with the policy-id/content-hash
/// self-invalidation rule. Generic over the backing variant so it can sit on
/// top of a `LocalCache`, `DistributedCache`, or `HybridCache` unchanged.
pub struct EmbeddingCache<C> {
    inner: Arc<C>,
}

impl<C> EmbeddingCache<C>
where
    C: Cache<EmbeddingEntry>,
{
    pub fn new(inner: Arc<C>) -> Self {
        Self { inner }
    }

    /// Returns the cached vector for `policy_id` iff its stored content hash
    /// matches `content_hash`. On mismatch the stale entry is removed.
    pub async fn get(&self, policy_id: &str, content_hash: &str) -> Option<Vec<f32>> {
        let entry = self.inner.get(policy_id).await?;
        if entry.content_hash == content_hash {
            Some(entry.vector)
        } else {
            self.inner.delete(policy_id).await;
            None
        }
    }

    pub async fn set(&self, policy_id: &str, content_hash: &str, vector: Vec<f32>) {
        self.inner
            .set(
                policy_id,
                EmbeddingEntry {
                    content_hash: content_hash.to_string(),
                    vector,
                },
            )
            .await;
    }

    pub async fn delete(&self, policy_id: &str) {
        self.inner.delete(policy_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use std::time::Duration;

    #[tokio::test]
    async fn test_matching_hash_returns_vector() {
        let local: Arc<LocalCache<EmbeddingEntry>> =
            Arc::new(LocalCache::new(10, Duration::from_secs(60)));
        let cache = EmbeddingCache::new(local);
        cache.set("policy-1", "hash-a", vec![1.0, 2.0]).await;
        assert_eq!(
            cache.get("policy-1", "hash-a").await,
            Some(vec![1.0, 2.0])
        );
    }

    #[tokio::test]
    async fn test_hash_mismatch_self_invalidates() {
        let local: Arc<LocalCache<EmbeddingEntry>> =
            Arc::new(LocalCache::new(10, Duration::from_secs(60)));
        let cache = EmbeddingCache::new(local);
        cache.set("policy-1", "hash-a", vec![1.0, 2.0]).await;

        assert_eq!(cache.get("policy-1", "hash-b").await, None);
        // self-invalidated: even the original hash now misses.
        assert_eq!(cache.get("policy-1", "hash-a").await, None);
    }

    #[tokio::test]
    async fn test_missing_entry_is_a_plain_miss() {
        let local: Arc<LocalCache<EmbeddingEntry>> =
            Arc::new(LocalCache::new(10, Duration::from_secs(60)));
        let cache = EmbeddingCache::new(local);
        assert_eq!(cache.get("absent", "hash-a").await, None);
    }
}
