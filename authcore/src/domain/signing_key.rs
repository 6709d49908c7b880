//! # Signing Key & JWKS
//!
//! RSA keypair lifecycle (spec §3, §4.3). Private key material lives only
//! in process memory; persistence (if any) goes through an externally
//! supplied encryptor, never as plaintext.

use chrono::{DateTime, Utc};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Pending,
    Active,
    Expired,
}

/// An RSA keypair plus its lifecycle state (spec §3, §4.3).
///
/// `private_key` is held only in memory; `Debug` is implemented by hand so
/// logging a `SigningKey` (even accidentally) never leaks it (§5
/// "Shared-resource policy": signing keys are never logged).
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
    pub algorithm: &'static str,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_primary: bool,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("status", &self.status)
            .field("is_primary", &self.is_primary)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl SigningKey {
    /// "Keys with status pending or expired must not sign" and must not
    /// verify unless still within their grace window — callers distinguish
    /// signing eligibility (`can_sign`) from verification eligibility
    /// (`can_verify`) because a rotated-with-grace key stays `active` for
    /// verification purposes until its expiry, but is never primary again.
    pub fn can_sign(&self, now: DateTime<Utc>) -> bool {
        self.status == KeyStatus::Active && !self.is_expired(now)
    }

    pub fn can_verify(&self, now: DateTime<Utc>) -> bool {
        self.status == KeyStatus::Active && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// PKCS#1 PEM encoding of the private key, for handing to an external
    /// encryptor before persistence.
    pub fn private_key_pem(&self) -> Result<String, rsa::pkcs1::Error> {
        Ok(self
            .private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)?
            .to_string())
    }

    pub fn public_key_pem(&self) -> Result<String, rsa::pkcs1::Error> {
        self.public_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
    }

    /// A single entry of a published JWKS document (spec §6).
    pub fn to_jwk(&self) -> Jwk {
        use rsa::traits::PublicKeyParts;
        Jwk {
            kid: self.kid.clone(),
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: self.algorithm.to_string(),
            n: base64_url(&self.public_key.n().to_bytes_be()),
            e: base64_url(&self.public_key.e().to_bytes_be()),
        }
    }
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A single JSON Web Key (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

/// `{ "keys": [ <JWK>, ... ] }` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn test_key(status: KeyStatus, expires_at: Option<DateTime<Utc>>) -> SigningKey {
        let private_key = RsaPrivateKey::new(&mut OsRng, 512).expect("keygen");
        let public_key = RsaPublicKey::from(&private_key);
        SigningKey {
            kid: "k-test".into(),
            private_key,
            public_key,
            algorithm: "RS256",
            status,
            created_at: Utc::now(),
            activated_at: None,
            expires_at,
            is_primary: false,
        }
    }

    #[test]
    fn test_debug_never_prints_private_key() {
        let key = test_key(KeyStatus::Active, None);
        let out = format!("{:?}", key);
        assert!(out.contains("redacted"));
        assert!(!out.contains("BEGIN RSA PRIVATE KEY"));
    }

    #[test]
    fn test_pending_key_cannot_sign_or_verify() {
        let key = test_key(KeyStatus::Pending, None);
        assert!(!key.can_sign(Utc::now()));
        assert!(!key.can_verify(Utc::now()));
    }

    #[test]
    fn test_expired_key_cannot_sign_or_verify() {
        let past = Utc::now() - chrono::Duration::hours(1);
        let key = test_key(KeyStatus::Active, Some(past));
        assert!(!key.can_sign(Utc::now()));
        assert!(!key.can_verify(Utc::now()));
    }

    #[test]
    fn test_to_jwk_shape() {
        let key = test_key(KeyStatus::Active, None);
        let jwk = key.to_jwk();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.use_, "sig");
        assert_eq!(jwk.alg, "RS256");
        assert!(!jwk.n.is_empty());
        assert!(!jwk.e.is_empty());
    }
}
