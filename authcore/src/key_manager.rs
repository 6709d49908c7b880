//! # Key Manager (C3)
//!
//! RSA signing-key lifecycle: generate, activate, rotate-with-grace,
//! deactivate, cleanup, publish (spec §4.3). Grounded in the JWT
//! signing-key pattern from `other_examples/trysoma-soma/token_issuance-mod.rs.rs`,
//! adapted from a single static key to a managed set with kid-based lookup.
//!
//! Mutators take the exclusive side of a `parking_lot::RwLock`; readers
//! (get-primary, get-by-kid, publish) take the shared side, so primary
//! promotion/demotion is atomic with respect to concurrent readers (spec
//! §4.3 concurrency model).

use crate::domain::signing_key::{Jwks, KeyStatus, SigningKey};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use uuid::Uuid;

const RSA_KEY_BITS: usize = 2048;

struct State {
    keys: Vec<SigningKey>,
}

/// Manages the set of RSA signing keys backing the Token Engine.
pub struct KeyManager {
    state: RwLock<State>,
    grace_period: chrono::Duration,
}

impl KeyManager {
    pub fn new(grace_period: chrono::Duration) -> Self {
        Self {
            state: RwLock::new(State { keys: Vec::new() }),
            grace_period,
        }
    }

    fn generate_keypair() -> CoreResult<(RsaPrivateKey, RsaPublicKey)> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(|_| CoreError::internal("RSA keypair generation failed"))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok((private_key, public_key))
    }

    /// Generates a new key with a unique `kid`. Becomes primary immediately
    /// if no other key exists yet (spec §4.3 "Generate").
    pub fn generate(&self, now: DateTime<Utc>) -> CoreResult<String> {
        let (private_key, public_key) = Self::generate_keypair()?;
        let kid = format!("k-{}", Uuid::new_v4());

        let mut state = self.state.write();
        let is_primary = state.keys.is_empty();
        state.keys.push(SigningKey {
            kid: kid.clone(),
            private_key,
            public_key,
            algorithm: "RS256",
            status: if is_primary { KeyStatus::Active } else { KeyStatus::Pending },
            created_at: now,
            activated_at: if is_primary { Some(now) } else { None },
            expires_at: None,
            is_primary,
        });
        Ok(kid)
    }

    /// Promotes a pending key to active (spec §4.3 "Activate").
    pub fn activate(&self, kid: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let mut state = self.state.write();
        let key = state
            .keys
            .iter_mut()
            .find(|k| k.kid == kid)
            .ok_or_else(|| CoreError::InvalidArgument(format!("no such key: {kid}")))?;
        key.status = KeyStatus::Active;
        key.activated_at = Some(now);
        Ok(())
    }

    /// Returns a clone of the primary signing key, for the Token Engine to
    /// sign with. Fails with `Internal` ("no signing key") if the primary is
    /// not in a signable state.
    pub fn primary_for_signing(&self, now: DateTime<Utc>) -> CoreResult<SigningKey> {
        let state = self.state.read();
        state
            .keys
            .iter()
            .find(|k| k.is_primary && k.can_sign(now))
            .cloned()
            .ok_or_else(|| CoreError::internal("no primary signing key available"))
    }

    /// Resolves a key by `kid` for signature verification.
    pub fn by_kid_for_verification(&self, kid: &str, now: DateTime<Utc>) -> CoreResult<SigningKey> {
        let state = self.state.read();
        let key = state
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or(CoreError::Unauthenticated)?;
        if !key.can_verify(now) {
            return Err(CoreError::Unauthenticated);
        }
        Ok(key.clone())
    }

    /// Generates a new primary key and bounds the old primary's validity to
    /// `now + grace` (spec §4.3 "Rotate"). Both keys verify during the grace
    /// window; only the new one signs. Returns the new key's `kid`.
    pub fn rotate_with_grace(&self, now: DateTime<Utc>) -> CoreResult<String> {
        let (private_key, public_key) = Self::generate_keypair()?;
        let new_kid = format!("k-{}", Uuid::new_v4());

        let mut state = self.state.write();
        for key in state.keys.iter_mut().filter(|k| k.is_primary) {
            key.is_primary = false;
            key.expires_at = Some(now + self.grace_period);
        }
        state.keys.push(SigningKey {
            kid: new_kid.clone(),
            private_key,
            public_key,
            algorithm: "RS256",
            status: KeyStatus::Active,
            created_at: now,
            activated_at: Some(now),
            expires_at: None,
            is_primary: true,
        });
        Ok(new_kid)
    }

    /// Forces a key out of `Active` immediately, for a suspected compromise
    /// (spec §4.3 "Deactivate") — bypasses the grace window entirely.
    pub fn deactivate(&self, kid: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let mut state = self.state.write();
        let key = state
            .keys
            .iter_mut()
            .find(|k| k.kid == kid)
            .ok_or_else(|| CoreError::InvalidArgument(format!("no such key: {kid}")))?;
        key.status = KeyStatus::Expired;
        key.expires_at = Some(now);
        key.is_primary = false;
        Ok(())
    }

    /// Removes keys that are past their expiry (spec §4.3 "Cleanup").
    /// Maintenance-only: safe to skip, safe to run repeatedly.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let before = state.keys.len();
        state.keys.retain(|k| !k.is_expired(now));
        before - state.keys.len()
    }

    /// Publishes a JWKS document containing every active, unexpired key
    /// (spec §4.3 "Publish", §6).
    pub fn publish_jwks(&self, now: DateTime<Utc>) -> Jwks {
        let state = self.state.read();
        Jwks {
            keys: state
                .keys
                .iter()
                .filter(|k| k.status == KeyStatus::Active && !k.is_expired(now))
                .map(|k| k.to_jwk())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> KeyManager {
        KeyManager::new(chrono::Duration::hours(24))
    }

    #[test]
    fn test_first_generated_key_becomes_primary_and_active() {
        let km = manager();
        let now = Utc::now();
        let kid = km.generate(now).unwrap();
        let key = km.primary_for_signing(now).unwrap();
        assert_eq!(key.kid, kid);
    }

    #[test]
    fn test_second_generated_key_is_pending_not_primary() {
        let km = manager();
        let now = Utc::now();
        km.generate(now).unwrap();
        let second = km.generate(now).unwrap();
        // primary is still the first key
        let primary = km.primary_for_signing(now).unwrap();
        assert_ne!(primary.kid, second);
    }

    #[test]
    fn test_rotate_with_grace_both_keys_verify_during_grace() {
        let km = manager();
        let now = Utc::now();
        let old_kid = km.generate(now).unwrap();
        let new_kid = km.rotate_with_grace(now).unwrap();

        assert!(km.by_kid_for_verification(&old_kid, now).is_ok());
        assert!(km.by_kid_for_verification(&new_kid, now).is_ok());

        let primary = km.primary_for_signing(now).unwrap();
        assert_eq!(primary.kid, new_kid);
    }

    #[test]
    fn test_old_key_fails_verification_after_grace_expiry() {
        let km = manager();
        let now = Utc::now();
        let old_kid = km.generate(now).unwrap();
        km.rotate_with_grace(now).unwrap();

        let past_grace = now + chrono::Duration::hours(25);
        assert!(km.by_kid_for_verification(&old_kid, past_grace).is_err());
    }

    #[test]
    fn test_deactivate_removes_key_from_jwks() {
        let km = manager();
        let now = Utc::now();
        let kid = km.generate(now).unwrap();
        km.deactivate(&kid, now).unwrap();
        let jwks = km.publish_jwks(now);
        assert!(jwks.keys.is_empty());
    }

    #[test]
    fn test_cleanup_removes_expired_keys() {
        let km = manager();
        let now = Utc::now();
        let old_kid = km.generate(now).unwrap();
        km.rotate_with_grace(now).unwrap();

        let past_grace = now + chrono::Duration::hours(25);
        let removed = km.cleanup(past_grace);
        assert_eq!(removed, 1);
        assert!(km.by_kid_for_verification(&old_kid, past_grace).is_err());
    }

    #[test]
    fn test_publish_jwks_contains_only_active_unexpired_keys() {
        let km = manager();
        let now = Utc::now();
        km.generate(now).unwrap();
        let jwks = km.publish_jwks(now);
        assert_eq!(jwks.keys.len(), 1);
    }
}
