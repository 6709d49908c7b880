//! # OAuth2 Client Registry (C7)
//!
//! Confidential-client credential storage and `client_credentials` token
//! issuance (spec §4.7). `bcrypt` hashes the client secret — distinct from
//! the Argon2id used for agent password credentials in
//! [`crate::agent_directory`] — because the teacher's auth stack already
//! reaches for `bcrypt` wherever a registry of externally-supplied app
//! secrets (not end-user passwords) needs hashing.

use crate::domain::oauth_client::OAuth2Client;
use crate::domain::token::TokenResponse;
use crate::error::{CoreError, CoreResult};
use crate::token_engine::TokenEngine;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::operation_span;
use tracing::Instrument;
use uuid::Uuid;

const BCRYPT_COST: u32 = 12;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait OAuth2ClientRepository: Send + Sync {
    async fn insert(&self, client: &OAuth2Client) -> CoreResult<()>;
    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<OAuth2Client>>;
    async fn update(&self, client: &OAuth2Client) -> CoreResult<()>;
}

pub struct OAuth2ClientRegistry {
    repository: std::sync::Arc<dyn OAuth2ClientRepository>,
    token_engine: std::sync::Arc<TokenEngine>,
}

impl OAuth2ClientRegistry {
    pub fn new(
        repository: std::sync::Arc<dyn OAuth2ClientRepository>,
        token_engine: std::sync::Arc<TokenEngine>,
    ) -> Self {
        Self {
            repository,
            token_engine,
        }
    }

    pub async fn create(
        &self,
        display_name: String,
        tenant_id: String,
        allowed_scopes: Vec<String>,
        plaintext_secret: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<OAuth2Client> {
        if display_name.trim().is_empty() {
            return Err(CoreError::InvalidArgument("display_name must not be blank".into()));
        }
        let secret_hash = bcrypt::hash(plaintext_secret, BCRYPT_COST).map_err(|_| CoreError::internal("secret hashing failed"))?;
        let client = OAuth2Client {
            id: Uuid::new_v4(),
            secret_hash,
            display_name,
            tenant_id,
            allowed_scopes,
            created_at: now,
            expires_at,
            revoked_at: None,
        };
        self.repository.insert(&client).await?;
        Ok(client)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<OAuth2Client> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(CoreError::Unauthenticated)
    }

    pub async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<()> {
        let mut client = self.get(id).await?;
        client.revoked_at = Some(now);
        self.repository.update(&client).await
    }

    /// Spec §4.7 "issue-token": `client_credentials` grant only. Unknown
    /// client and wrong-secret both collapse to `Unauthenticated` — the
    /// spec requires this unification to prevent client-id enumeration.
    pub async fn issue_token(
        &self,
        grant_type: &str,
        client_id: &str,
        client_secret: &str,
        requested_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<TokenResponse> {
        let span = operation_span!("oauth2_issue_token", client_id);
        async move {
            if grant_type != "client_credentials" {
                return Err(CoreError::InvalidArgument("unsupported grant_type".into()));
            }
            let id = Uuid::parse_str(client_id).map_err(|_| CoreError::InvalidArgument("malformed client_id".into()))?;

            let client = match self.repository.find_by_id(id).await? {
                Some(c) if c.is_active(now) => c,
                _ => return Err(CoreError::Unauthenticated),
            };

            if !bcrypt::verify(client_secret, &client.secret_hash).unwrap_or(false) {
                return Err(CoreError::Unauthenticated);
            }

            let requested_scopes: Vec<String> = requested_scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            if !client.permits_scopes(&requested_scopes) {
                return Err(CoreError::InvalidArgument("scope exceeds allowed_scopes".into()));
            }

            self.token_engine
                .issue_for_client(client.id.to_string(), client.tenant_id.clone(), requested_scopes, now)
                .await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcrypt_hash_round_trip() {
        let hash = bcrypt::hash("s3cret", BCRYPT_COST).unwrap();
        assert!(bcrypt::verify("s3cret", &hash).unwrap());
        assert!(!bcrypt::verify("wrong", &hash).unwrap());
    }
}
