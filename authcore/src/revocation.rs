//! # Revocation List (C5)
//!
//! A set of revoked JWT `jti`s, keyed `revoked:jwt:{jti}` with a TTL equal
//! to the remaining token lifetime — once a token would have expired
//! naturally, its revocation record is no longer needed (spec §4.5).
//! Grounded in the teacher's Redis-backed blacklist (`RedisClient`
//! primitives), generalized from a single token-blacklist call into a
//! named component with explicit batch support.

use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use shared::operation_span;
use shared::redis_client::RedisClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const KEY_PREFIX: &str = "revoked:jwt:";

pub struct RevocationList {
    client: Arc<RedisClient>,
}

impl RevocationList {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }

    fn key(jti: &str) -> String {
        format!("{KEY_PREFIX}{jti}")
    }

    /// Revokes `jti` until `expires_at`. A no-op if `expires_at` is already
    /// in the past — there is nothing left to protect against (spec §4.5).
    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
        let span = operation_span!("revoke_token", jti);
        async move {
            if expires_at <= now {
                return Ok(());
            }
            let ttl = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
            self.client
                .set_raw(&Self::key(jti), &expires_at.to_rfc3339(), Some(ttl))
                .await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Revokes a batch of `(jti, expires_at)` pairs in a single pipelined
    /// round trip (spec §4.5 "batch variants use a single pipelined round
    /// trip"). Entries already past `expires_at` are skipped, same as the
    /// single-item path.
    pub async fn revoke_many(
        &self,
        entries: &[(String, DateTime<Utc>)],
        now: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let span = operation_span!("revoke_token_batch", entries.len());
        async move {
            let pending: Vec<(String, String, Option<Duration>)> = entries
                .iter()
                .filter(|(_, expires_at)| *expires_at > now)
                .map(|(jti, expires_at)| {
                    let ttl = (*expires_at - now).to_std().unwrap_or(Duration::ZERO);
                    (Self::key(jti), expires_at.to_rfc3339(), Some(ttl))
                })
                .collect();
            let revoked = pending.len();
            self.client.pipeline_set_raw(&pending).await?;
            Ok(revoked)
        }
        .instrument(span)
        .await
    }

    pub async fn is_revoked(&self, jti: &str) -> CoreResult<bool> {
        let span = operation_span!("is_revoked", jti);
        async move { Ok(self.client.exists(&Self::key(jti)).await?) }
            .instrument(span)
            .await
    }

    /// Checks a batch of `jti`s in a single pipelined round trip (spec
    /// §4.5), returning one bool per input in the same order.
    pub async fn is_revoked_many(&self, jtis: &[String]) -> CoreResult<Vec<bool>> {
        let span = operation_span!("is_revoked_batch", jtis.len());
        async move {
            let keys: Vec<String> = jtis.iter().map(|j| Self::key(j)).collect();
            Ok(self.client.exists_many(&keys).await?)
        }
        .instrument(span)
        .await
    }

    /// Maintenance sweep: scans the prefix, parses each entry's stored
    /// expiry timestamp, and deletes those already in the past (spec §4.5).
    /// Not load-bearing for correctness — the TTL already self-cleans — but
    /// still an observable removal, not a no-op.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let keys = self.client.scan_keys(&format!("{KEY_PREFIX}*")).await?;
        let mut stale = Vec::new();
        for key in &keys {
            let Some(raw) = self.client.get_raw(key).await? else {
                continue;
            };
            let Ok(expires_at) = DateTime::parse_from_rfc3339(&raw) else {
                continue;
            };
            if expires_at.with_timezone(&Utc) <= now {
                stale.push(key.clone());
            }
        }
        Ok(self.client.delete_many(&stale).await? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(RevocationList::key("jti-1"), "revoked:jwt:jti-1");
    }
}
