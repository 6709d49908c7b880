//! # Core Configuration
//!
//! Environment-driven settings for the authorization core, layered the same
//! way `shared::config::AppConfig` is (spec §1.1: `config` + `dotenvy`,
//! `AUTHCORE_`-prefixed environment overrides).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub issuer: String,
    pub audience: String,

    #[serde(default = "default_access_ttl_seconds")]
    pub access_ttl_seconds: i64,
    #[serde(default = "default_refresh_ttl_seconds")]
    pub refresh_ttl_seconds: i64,

    #[serde(default = "default_key_rotation_grace_seconds")]
    pub key_rotation_grace_seconds: i64,

    #[serde(default = "default_rate_limit_fail_open")]
    pub rate_limit_fail_open: bool,

    #[serde(default = "default_cache_l1_capacity")]
    pub cache_l1_capacity: usize,
    #[serde(default = "default_cache_l1_ttl_seconds")]
    pub cache_l1_ttl_seconds: u64,
    #[serde(default = "default_agent_cache_ttl_seconds")]
    pub agent_cache_ttl_seconds: u64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_revocation_fail_open_on_outage")]
    pub revocation_fail_open_on_declared_outage: bool,
}

fn default_access_ttl_seconds() -> i64 {
    3600
}

fn default_refresh_ttl_seconds() -> i64 {
    7 * 24 * 3600
}

fn default_key_rotation_grace_seconds() -> i64 {
    24 * 3600
}

fn default_rate_limit_fail_open() -> bool {
    true
}

fn default_cache_l1_capacity() -> usize {
    10_000
}

fn default_cache_l1_ttl_seconds() -> u64 {
    300
}

fn default_agent_cache_ttl_seconds() -> u64 {
    300
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_revocation_fail_open_on_outage() -> bool {
    false
}

impl CoreConfig {
    /// Loads configuration from `AUTHCORE_*` environment variables, falling
    /// back to the defaults above for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("issuer", "authcore")?
            .set_default("audience", "authcore-api")?
            .add_source(Environment::with_prefix("AUTHCORE").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_seconds.max(0) as u64)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_seconds.max(0) as u64)
    }

    pub fn key_rotation_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.key_rotation_grace_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        assert_eq!(default_access_ttl_seconds(), 3600);
        assert_eq!(default_refresh_ttl_seconds(), 7 * 24 * 3600);
        assert!(default_rate_limit_fail_open());
        assert!(!default_revocation_fail_open_on_outage());
    }
}
