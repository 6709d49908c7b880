//! # Cache Substrate (C1)
//!
//! Three interchangeable implementations behind one contract (spec §4.1):
//! a local LRU+TTL cache, a distributed KV-backed cache, and a hybrid that
//! composes both with write-through semantics. A fourth specialization,
//! the Embedding Cache, layers a content-hash check on top.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `local` | LRU with per-entry TTL, single exclusive lock |
//! | `distributed` | JSON-serialized values behind a namespace prefix |
//! | `hybrid` | L1 (local) + L2 (distributed), degrades to L1-only |
//! | `embedding` | `(policy-id, content-hash) -> vector`, self-invalidating |

pub mod distributed;
pub mod embedding;
pub mod hybrid;
pub mod local;

pub use distributed::DistributedCache;
pub use embedding::EmbeddingCache;
pub use hybrid::HybridCache;
pub use local::LocalCache;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Point-in-time statistics for a cache instance (spec §4.1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Common contract every Cache Substrate variant implements (spec §4.1).
///
/// Values must be `Serialize + DeserializeOwned` because the distributed
/// and hybrid variants round-trip them through JSON; the local variant pays
/// no serialization cost but honors the same bound for interchangeability.
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    async fn get(&self, key: &str) -> Option<V>;
    async fn set(&self, key: &str, value: V);
    async fn delete(&self, key: &str);
    async fn clear(&self);
    fn stats(&self) -> CacheStats;
}
