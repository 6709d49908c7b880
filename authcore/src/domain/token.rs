//! # Token Claims & Refresh Token Record
//!
//! Wire shapes for the bearer token payload and the server-side refresh
//! token record (spec §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload claims minted by the Token Engine (spec §6).
///
/// Field names follow the registered JWT claim names (`iss`, `sub`, `aud`,
/// `exp`, `iat`, `jti`) plus the core's private claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub jti: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub scopes: Vec<String>,
    pub agent_id: String,
    pub agent_type: String,
    pub agent_status: String,
    pub capabilities: Vec<String>,
}

impl Claims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Server-side record of an issued refresh token (spec §3). The token
/// itself is never stored — only its SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    /// Base64url-encoded SHA-256 hash of the refresh token string.
    pub token_hash: String,
    pub agent_id: String,
    /// jti of the access token minted alongside this refresh token.
    pub access_jti: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// "A refresh token is *usable* iff not revoked and not expired" (spec
    /// §3).
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Response returned by Issue/Refresh (spec §6 "Token-issuance response").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(revoked: bool, expires_in: Duration) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: "hash".into(),
            agent_id: "a1".into(),
            access_jti: "jti-1".into(),
            created_at: Utc::now(),
            expires_at: Utc::now() + expires_in,
            revoked_at: if revoked { Some(Utc::now()) } else { None },
            last_used_at: None,
        }
    }

    #[test]
    fn test_refresh_token_usable_iff_not_revoked_not_expired() {
        assert!(record(false, Duration::days(7)).is_usable(Utc::now()));
        assert!(!record(true, Duration::days(7)).is_usable(Utc::now()));
        assert!(!record(false, Duration::seconds(-1)).is_usable(Utc::now()));
    }

    #[test]
    fn test_claims_scope_string_is_space_joined() {
        let claims = Claims {
            sub: "a1".into(),
            iss: "authcore".into(),
            aud: "authcore-api".into(),
            exp: 0,
            iat: 0,
            nbf: None,
            jti: "jti".into(),
            tenant_id: "t1".into(),
            roles: vec![],
            scopes: vec!["read:*".into(), "write:*".into()],
            agent_id: "a1".into(),
            agent_type: "service".into(),
            agent_status: "active".into(),
            capabilities: vec![],
        };
        assert_eq!(claims.scope_string(), "read:* write:*");
    }
}
