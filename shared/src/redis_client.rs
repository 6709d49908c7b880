//! # Distributed KV Client
//!
//! Thin async client over a Redis-compatible distributed store. This crate
//! only owns connection bootstrap and the handful of primitive commands
//! every collaborator built on top of it needs (get/set/delete/incr/expire,
//! plus running a server-side script atomically). Domain-specific key
//! layouts and semantics — the cache substrate, the rate limiter, the
//! revocation list — live in `authcore`, each with its own prefix and TTL
//! policy; this module doesn't know about any of them.
//!
//! ## Connection Management
//!
//! We use a `ConnectionManager`, which reconnects automatically on failure.
//! This is more resilient than a bare connection for a long-running process.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::redis_client::RedisClient;
//! use shared::config::RedisConfig;
//! use std::time::Duration;
//!
//! let redis = RedisClient::new(&config).await?;
//! redis.set("key", &"value", Some(Duration::from_secs(3600))).await?;
//! let value: Option<String> = redis.get("key").await?;
//! ```

use crate::config::RedisConfig;
use crate::errors::InfraError;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::info;

/// Async distributed-KV client with automatic reconnection.
///
/// Cheap to clone (an `Arc` internally via `ConnectionManager`); share one
/// instance across every component that needs the store.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connects to the configured distributed store.
    pub async fn new(config: &RedisConfig) -> Result<Self, InfraError> {
        info!(url = %config.url, "connecting to distributed store");

        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        info!("distributed store connection established");

        Ok(Self { conn })
    }

    /// Stores a JSON-serialized value with an optional TTL.
    pub async fn set<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), InfraError> {
        let serialized =
            serde_json::to_string(value).map_err(|e| InfraError::Redis(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "serialization failure",
                e.to_string(),
            ))))?;

        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, &serialized, duration.as_secs())
                    .await?
            }
            None => conn.set::<_, _, ()>(key, &serialized).await?,
        }
        Ok(())
    }

    /// Stores a raw string value with an optional TTL (no JSON envelope).
    ///
    /// Used by collaborators whose values are already opaque strings (e.g.
    /// the revocation list stores a bare expiry timestamp).
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), InfraError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => conn.set_ex::<_, _, ()>(key, value, duration.as_secs()).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    /// Retrieves and JSON-deserializes a value.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, InfraError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        match value {
            Some(s) => {
                let deserialized = serde_json::from_str(&s).map_err(|e| {
                    InfraError::Redis(redis::RedisError::from((
                        redis::ErrorKind::TypeError,
                        "deserialization failure",
                        e.to_string(),
                    )))
                })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// Deletes a key. Returns `true` iff a key was actually removed.
    pub async fn delete(&self, key: &str) -> Result<bool, InfraError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Deletes many keys in a single round trip. Returns the number removed.
    pub async fn delete_many(&self, keys: &[String]) -> Result<i64, InfraError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(keys).await?;
        Ok(deleted)
    }

    /// Checks whether a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool, InfraError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    /// Scans for keys matching a pattern. Uses `SCAN` rather than `KEYS` so
    /// it never blocks the store, at the cost of returning a (possibly
    /// stale) snapshot rather than a point-in-time view.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, InfraError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut out = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            out.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(out)
    }

    /// Runs a Lua script with the given keys/args, evaluated atomically by
    /// the store. This is the primitive the rate limiter builds its
    /// token-bucket step on.
    pub async fn eval_script<T: redis::FromRedisValue>(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[String],
    ) -> Result<T, InfraError> {
        let mut conn = self.conn.clone();
        let mut invocation = script.key(keys);
        for arg in args {
            invocation.arg(arg);
        }
        Ok(invocation.invoke_async(&mut conn).await?)
    }

    /// Retrieves a raw string value without JSON decoding.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, InfraError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    /// Stores many raw string values, each with its own optional TTL, in a
    /// single pipelined round trip.
    pub async fn pipeline_set_raw(&self, entries: &[(String, String, Option<Duration>)]) -> Result<(), InfraError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for (key, value, ttl) in entries {
            match ttl {
                Some(duration) => {
                    pipe.set_ex(key, value, duration.as_secs());
                }
                None => {
                    pipe.set(key, value);
                }
            }
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Checks existence of many keys in a single pipelined round trip,
    /// returning one bool per input key in the same order. Unlike the
    /// variadic `EXISTS` command (which returns a single count), this
    /// reports per-key results.
    pub async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>, InfraError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.exists(key);
        }
        Ok(pipe.query_async(&mut conn).await?)
    }

    /// Sets a TTL on an existing key. Returns `false` if the key is absent.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, InfraError> {
        let mut conn = self.conn.clone();
        Ok(conn.expire(key, ttl.as_secs() as i64).await?)
    }

    /// Health check — verifies the store is responding.
    pub async fn ping(&self) -> Result<(), InfraError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}
