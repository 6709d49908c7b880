//! # Rate Limiter (C2)
//!
//! Token-bucket rate limiting evaluated atomically by the distributed store
//! (spec §4.2). The refill/consume arithmetic runs inside a Lua script so
//! concurrent callers never race on a read-modify-write pair — grounded in
//! `shared::redis_client::RedisClient::eval_script`, the same primitive the
//! teacher's `Script`/`ConnectionManager` stack was already built on.

use crate::error::{CoreError, CoreResult};
use redis::Script;
use shared::operation_span;
use shared::redis_client::RedisClient;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Instrument;

/// Atomic token-bucket step (spec §4.2):
///
/// ```text
/// tokens, last_refill = read or (capacity, now)
/// tokens = min(capacity, tokens + (now - last_refill) * rate)
/// if tokens >= cost: tokens -= cost; allowed = 1
/// else: allowed = 0
/// write tokens, now; set TTL = ceil(2 * capacity / rate)
/// return allowed, tokens, retry_after
/// ```
const TOKEN_BUCKET_SCRIPT: &str = r#"
local tokens_key = KEYS[1] .. ":tokens"
local refill_key = KEYS[1] .. ":refill"
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now = tonumber(ARGV[4])

local tokens = tonumber(redis.call("GET", tokens_key))
local last_refill = tonumber(redis.call("GET", refill_key))
if tokens == nil or last_refill == nil then
  tokens = capacity
  last_refill = now
end

local elapsed = now - last_refill
if elapsed < 0 then elapsed = 0 end
tokens = math.min(capacity, tokens + elapsed * rate)

local allowed = 0
local retry_after = 0
if tokens >= cost then
  tokens = tokens - cost
  allowed = 1
else
  retry_after = (cost - tokens) / rate
end

local ttl = math.ceil((2 * capacity) / rate)
redis.call("SET", tokens_key, tostring(tokens), "EX", ttl)
redis.call("SET", refill_key, tostring(now), "EX", ttl)

return {tostring(allowed), tostring(tokens), tostring(retry_after)}
"#;

/// Rate-limit key classes by prefix (spec §4.2). Each class gets its own
/// capacity/refill-rate policy; unclassified keys fall back to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// `auth:` — strict.
    Auth,
    /// `auth:/v1/auth/token:` — stricter than plain `Auth`.
    AuthToken,
    /// `authcheck:` — high-throughput.
    AuthCheck,
    /// `user:` — per-user.
    User,
    /// `ip:` or anything unclassified.
    Default,
}

impl KeyClass {
    pub fn classify(key: &str) -> Self {
        if key.starts_with("auth:/v1/auth/token:") {
            KeyClass::AuthToken
        } else if key.starts_with("auth:") {
            KeyClass::Auth
        } else if key.starts_with("authcheck:") {
            KeyClass::AuthCheck
        } else if key.starts_with("user:") {
            KeyClass::User
        } else {
            KeyClass::Default
        }
    }

    /// (capacity, refill-rate-per-second) policy for this class.
    pub fn policy(self) -> (f64, f64) {
        match self {
            KeyClass::AuthToken => (5.0, 1.0 / 60.0),
            KeyClass::Auth => (20.0, 1.0 / 10.0),
            KeyClass::AuthCheck => (1000.0, 200.0),
            KeyClass::User => (100.0, 10.0),
            KeyClass::Default => (60.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: f64,
    pub retry_after_seconds: f64,
}

/// Token-bucket rate limiter over a distributed store.
///
/// Whether a store-unreachable error fails open (admit) or closed (deny) is
/// configurable; the spec takes fail-open as the default (§4.2).
pub struct RateLimiter {
    client: Arc<RedisClient>,
    script: Script,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(client: Arc<RedisClient>, fail_open: bool) -> Self {
        Self {
            client,
            script: Script::new(TOKEN_BUCKET_SCRIPT),
            fail_open,
        }
    }

    /// Evaluates one request of `cost` tokens against `key`'s bucket,
    /// classified by prefix per spec §4.2.
    pub async fn check(&self, key: &str, cost: f64) -> CoreResult<RateLimitDecision> {
        let (capacity, rate) = KeyClass::classify(key).policy();
        self.check_with_policy(key, cost, capacity, rate).await
    }

    pub async fn check_with_policy(
        &self,
        key: &str,
        cost: f64,
        capacity: f64,
        rate: f64,
    ) -> CoreResult<RateLimitDecision> {
        let span = operation_span!("rate_limit_check", key);
        async move {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| CoreError::internal("system clock before unix epoch"))?
                .as_secs_f64();

            let result: Result<Vec<String>, _> = self
                .client
                .eval_script(
                    &self.script,
                    &[key],
                    &[
                        capacity.to_string(),
                        rate.to_string(),
                        cost.to_string(),
                        now.to_string(),
                    ],
                )
                .await;

            match result {
                Ok(values) if values.len() == 3 => {
                    let allowed = values[0] == "1";
                    let remaining: f64 = values[1].parse().unwrap_or(0.0);
                    let retry_after: f64 = values[2].parse().unwrap_or(0.0);
                    Ok(RateLimitDecision {
                        allowed,
                        remaining,
                        retry_after_seconds: retry_after,
                    })
                }
                Ok(_) => Err(CoreError::internal("rate limit script returned unexpected shape")),
                Err(_) if self.fail_open => Ok(RateLimitDecision {
                    allowed: true,
                    remaining: capacity,
                    retry_after_seconds: 0.0,
                }),
                Err(_) => Err(CoreError::backend_unavailable("redis")),
            }
        }
        .instrument(span)
        .await
    }

    /// Deletes a key's bucket state entirely (spec §4.2 `reset`).
    pub async fn reset(&self, key: &str) -> CoreResult<()> {
        let keys = vec![format!("{key}:tokens"), format!("{key}:refill")];
        self.client
            .delete_many(&keys)
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_classification() {
        assert_eq!(KeyClass::classify("auth:/v1/auth/token:agent-1"), KeyClass::AuthToken);
        assert_eq!(KeyClass::classify("auth:login"), KeyClass::Auth);
        assert_eq!(KeyClass::classify("authcheck:agent-1"), KeyClass::AuthCheck);
        assert_eq!(KeyClass::classify("user:u1"), KeyClass::User);
        assert_eq!(KeyClass::classify("ip:1.2.3.4"), KeyClass::Default);
        assert_eq!(KeyClass::classify("unclassified"), KeyClass::Default);
    }

    #[test]
    fn test_auth_token_class_is_stricter_than_plain_auth() {
        let (auth_cap, auth_rate) = KeyClass::Auth.policy();
        let (token_cap, token_rate) = KeyClass::AuthToken.policy();
        assert!(token_cap <= auth_cap);
        assert!(token_rate <= auth_rate);
    }
}
