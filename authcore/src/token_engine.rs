//! # Token Engine (C6)
//!
//! Issues, validates, refreshes, and revokes bearer tokens (spec §4.6).
//! Composes the Key Manager (C3), Agent Directory (C4), Cache Substrate
//! (C1), and Revocation List (C5) behind one surface; never leaks a
//! backing-store error type, only `CoreError` (spec §4.6.6).
//!
//! RS256 signing via `jsonwebtoken`, grounded in
//! `other_examples/trysoma-soma/token_issuance-mod.rs.rs`'s
//! `sign_jwt`/`EncodingKey::from_rsa_pem` pattern, generalized from a single
//! static key to key lookup through the Key Manager by `kid`.

use crate::agent_directory::AgentDirectory;
use crate::cache::Cache;
use crate::domain::agent::Agent;
use crate::domain::token::{Claims, RefreshTokenRecord, TokenResponse};
use crate::error::{CoreError, CoreResult};
use crate::key_manager::KeyManager;
use crate::revocation::RevocationList;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use shared::operation_span;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Storage seam for refresh tokens (spec §4.6.1/.3). Only the SHA-256 hash
/// of the token is ever persisted.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> CoreResult<()>;
    async fn find_by_hash(&self, token_hash: &str) -> CoreResult<Option<RefreshTokenRecord>>;
}

pub struct TokenEngineConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: ChronoDuration,
    pub refresh_ttl: ChronoDuration,
    pub agent_cache_ttl: ChronoDuration,
    /// §4.6.6: revocation-store errors during Validate fail closed by
    /// default (reject if the store can't be consulted); set `true` only
    /// during a declared outage window.
    pub revocation_fail_open: bool,
}

pub struct TokenEngine {
    key_manager: Arc<KeyManager>,
    agent_directory: Arc<AgentDirectory>,
    refresh_store: Option<Arc<dyn RefreshTokenStore>>,
    revocation: Option<Arc<RevocationList>>,
    agent_cache: Option<Arc<dyn Cache<Agent>>>,
    config: TokenEngineConfig,
}

/// Caller-supplied inputs to `issue` (spec §4.6.1).
pub struct IssueRequest {
    pub agent_id: String,
    pub requested_roles: Vec<String>,
    pub requested_scopes: Vec<String>,
    pub with_refresh_token: bool,
}

impl TokenEngine {
    pub fn new(
        key_manager: Arc<KeyManager>,
        agent_directory: Arc<AgentDirectory>,
        refresh_store: Option<Arc<dyn RefreshTokenStore>>,
        revocation: Option<Arc<RevocationList>>,
        agent_cache: Option<Arc<dyn Cache<Agent>>>,
        config: TokenEngineConfig,
    ) -> Self {
        Self {
            key_manager,
            agent_directory,
            refresh_store,
            revocation,
            agent_cache,
            config,
        }
    }

    async fn resolve_agent(&self, agent_id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        let cache_key = format!("agent:{agent_id}");
        if let Some(cache) = &self.agent_cache {
            if let Some(agent) = cache.get(&cache_key).await {
                return Ok(agent);
            }
        }
        let agent = self.agent_directory.get(agent_id, now).await?;
        if let Some(cache) = &self.agent_cache {
            cache.set(&cache_key, agent.clone()).await;
        }
        Ok(agent)
    }

    /// Spec §4.6.1 "Issue".
    pub async fn issue(&self, request: IssueRequest, now: DateTime<Utc>) -> CoreResult<TokenResponse> {
        let span = operation_span!("issue", request.agent_id);
        async move {
            let agent = self.resolve_agent(&request.agent_id, now).await?;
            if !agent.is_eligible_for_authorization(now) {
                return Err(CoreError::NotActive);
            }

            let roles = Self::merged_roles(&request.requested_roles, &agent);
            let scopes = if request.requested_scopes.is_empty() {
                agent.metadata.scopes()
            } else {
                request.requested_scopes.clone()
            };

            let (claims, access_token) = self.build_and_sign(
                agent.id.clone(),
                agent.tenant_id.clone(),
                roles,
                scopes,
                agent.id.clone(),
                agent.kind.as_str().to_string(),
                agent.status.as_str().to_string(),
                agent.metadata.capabilities(),
                now,
            )?;

            let refresh_token = if request.with_refresh_token {
                Some(self.issue_refresh_token(&agent, &claims.jti, now).await?)
            } else {
                None
            };

            Ok(TokenResponse {
                access_token,
                token_type: "Bearer",
                expires_in: self.config.access_ttl.num_seconds(),
                refresh_token,
                scope: claims.scope_string(),
            })
        }
        .instrument(span)
        .await
    }

    /// Issues a token for an OAuth2 confidential client (spec §4.7's
    /// "delegate to Token Engine with client's tenant + resolved scopes").
    /// A client is not an `Agent` — there is no directory lookup, no
    /// implicit `agent:{kind}` role, and never a refresh token, but the
    /// claim shape and signing path are exactly the same as `issue`.
    pub async fn issue_for_client(
        &self,
        client_id: String,
        tenant_id: String,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<TokenResponse> {
        let span = operation_span!("issue_for_client", client_id);
        async move {
            let (claims, access_token) = self.build_and_sign(
                client_id.clone(),
                tenant_id,
                vec!["agent:oauth2_client".to_string()],
                scopes,
                client_id,
                "oauth2_client".to_string(),
                "active".to_string(),
                Vec::new(),
                now,
            )?;

            Ok(TokenResponse {
                access_token,
                token_type: "Bearer",
                expires_in: self.config.access_ttl.num_seconds(),
                refresh_token: None,
                scope: claims.scope_string(),
            })
        }
        .instrument(span)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    fn build_and_sign(
        &self,
        sub: String,
        tenant_id: String,
        roles: Vec<String>,
        scopes: Vec<String>,
        agent_id: String,
        agent_type: String,
        agent_status: String,
        capabilities: Vec<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<(Claims, String)> {
        let exp = now + self.config.access_ttl;
        let claims = Claims {
            sub,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: None,
            jti: Self::random_jti(),
            tenant_id,
            roles,
            scopes,
            agent_id,
            agent_type,
            agent_status,
            capabilities,
        };
        let signing_key = self.key_manager.primary_for_signing(now)?;
        let access_token = Self::sign(&claims, &signing_key)?;
        Ok((claims, access_token))
    }

    fn merged_roles(requested: &[String], agent: &Agent) -> Vec<String> {
        let mut roles: Vec<String> = requested.to_vec();
        roles.push(agent.kind.implicit_role());
        roles.extend(agent.metadata.roles());
        roles.sort();
        roles.dedup();
        roles
    }

    fn random_jti() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn sign(claims: &Claims, signing_key: &crate::domain::signing_key::SigningKey) -> CoreResult<String> {
        let pem = signing_key.private_key_pem().map_err(|_| CoreError::internal("signing key PEM encode failed"))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|_| CoreError::internal("invalid RSA PEM"))?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(signing_key.kid.clone());
        Ok(encode(&header, claims, &encoding_key)?)
    }

    async fn issue_refresh_token(&self, agent: &Agent, access_jti: &str, now: DateTime<Utc>) -> CoreResult<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = format!("refresh_{}", URL_SAFE_NO_PAD.encode(bytes));
        let token_hash = Self::hash_refresh_token(&token);

        if let Some(store) = &self.refresh_store {
            store
                .insert(&RefreshTokenRecord {
                    id: Uuid::new_v4(),
                    token_hash,
                    agent_id: agent.id.clone(),
                    access_jti: access_jti.to_string(),
                    created_at: now,
                    expires_at: now + self.config.refresh_ttl,
                    revoked_at: None,
                    last_used_at: None,
                })
                .await?;
        }
        Ok(token)
    }

    fn hash_refresh_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Spec §4.6.2 "Validate". The token itself is never a span field — only
    /// the `kid`/`jti` it resolves to, once known (signing keys and bearer
    /// tokens are never logged, spec §5).
    pub async fn validate(&self, token: &str, now: DateTime<Utc>, skip_agent_status_check: bool) -> CoreResult<Claims> {
        let span = operation_span!("validate", "pending");
        async move {
            if token.is_empty() {
                return Err(CoreError::Unauthenticated);
            }

            let header = jsonwebtoken::decode_header(token).map_err(|_| CoreError::Unauthenticated)?;
            if header.alg != Algorithm::RS256 {
                // Hard fail on anything but RS256, including "none" — prevents
                // algorithm-confusion attacks (spec §4.6.2).
                return Err(CoreError::Unauthenticated);
            }
            let kid = header.kid.ok_or(CoreError::Unauthenticated)?;
            let signing_key = self.key_manager.by_kid_for_verification(&kid, now)?;

            let pem = signing_key.public_key_pem().map_err(|_| CoreError::internal("signing key PEM encode failed"))?;
            let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|_| CoreError::internal("invalid RSA PEM"))?;

            let mut validation = Validation::new(Algorithm::RS256);
            validation.set_audience(&[&self.config.audience]);
            validation.set_issuer(&[&self.config.issuer]);
            validation.leeway = 30; // small clock-skew tolerance

            let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|_| CoreError::Unauthenticated)?;
            let claims = data.claims;

            if claims.jti.is_empty() {
                return Err(CoreError::Unauthenticated);
            }
            tracing::Span::current().record("subject", tracing::field::display(&claims.jti));

            if let Some(revocation) = &self.revocation {
                match revocation.is_revoked(&claims.jti).await {
                    Ok(true) => return Err(CoreError::Revoked),
                    Ok(false) => {}
                    Err(_) if self.config.revocation_fail_open => {}
                    Err(e) => return Err(e),
                }
            }

            if !skip_agent_status_check {
                let agent = self.resolve_agent(&claims.agent_id, now).await?;
                if !agent.is_eligible_for_authorization(now) {
                    return Err(CoreError::NotActive);
                }
            }

            Ok(claims)
        }
        .instrument(span)
        .await
    }

    /// Spec §4.6.3 "Refresh". Reloads agent metadata fresh (not the
    /// snapshot embedded in the old token) and reissues via `issue`.
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> CoreResult<TokenResponse> {
        let span = operation_span!("refresh", "pending");
        async move {
            let store = self.refresh_store.as_ref().ok_or_else(|| CoreError::internal("no refresh token store configured"))?;
            let token_hash = Self::hash_refresh_token(refresh_token);
            let record = store
                .find_by_hash(&token_hash)
                .await?
                .ok_or(CoreError::Unauthenticated)?;
            tracing::Span::current().record("subject", tracing::field::display(&record.agent_id));

            if !record.is_usable(now) {
                return Err(if record.expires_at <= now {
                    CoreError::Expired
                } else {
                    CoreError::Revoked
                });
            }

            self.issue(
                IssueRequest {
                    agent_id: record.agent_id,
                    requested_roles: Vec::new(),
                    requested_scopes: Vec::new(),
                    with_refresh_token: true,
                },
                now,
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Spec §4.6.4 "Revoke" — delegates to C5.
    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
        let span = operation_span!("revoke", jti);
        async move {
            let revocation = self.revocation.as_ref().ok_or_else(|| CoreError::internal("no revocation list configured"))?;
            revocation.revoke(jti, expires_at, now).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_directory::{AgentDirectory, MockAgentRepository};
    use crate::domain::agent::{AgentKind, AgentStatus, Credential, CredentialKind};
    use crate::domain::metadata::Metadata;

    fn test_agent() -> Agent {
        let now = Utc::now();
        Agent {
            id: "a1".into(),
            kind: AgentKind::Service,
            display_name: "svc".into(),
            status: AgentStatus::Active,
            tenant_id: "t1".into(),
            credentials: vec![Credential {
                id: "c1".into(),
                kind: CredentialKind::ApiKey,
                opaque_value: "hash".into(),
                issued_at: now,
                expires_at: None,
            }],
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    fn engine_with_agent(agent: Agent) -> TokenEngine {
        let mut mock = MockAgentRepository::new();
        let returned = agent.clone();
        mock.expect_find_by_id()
            .returning(move |_| Box::pin({
                let a = returned.clone();
                async move { Ok(Some(a)) }
            }));
        mock.expect_update().returning(|_| Box::pin(async { Ok(()) }));
        let directory = Arc::new(AgentDirectory::new(Arc::new(mock)));

        let key_manager = Arc::new(KeyManager::new(ChronoDuration::hours(24)));
        key_manager.generate(Utc::now()).unwrap();

        TokenEngine::new(
            key_manager,
            directory,
            None,
            None,
            None,
            TokenEngineConfig {
                issuer: "authcore".into(),
                audience: "authcore-api".into(),
                access_ttl: ChronoDuration::hours(1),
                refresh_ttl: ChronoDuration::days(7),
                agent_cache_ttl: ChronoDuration::minutes(5),
                revocation_fail_open: true,
            },
        )
    }

    #[tokio::test]
    async fn test_issue_then_validate_round_trip() {
        let now = Utc::now();
        let engine = engine_with_agent(test_agent());
        let response = engine
            .issue(
                IssueRequest {
                    agent_id: "a1".into(),
                    requested_roles: vec![],
                    requested_scopes: vec![],
                    with_refresh_token: false,
                },
                now,
            )
            .await
            .unwrap();

        let claims = engine.validate(&response.access_token, now, false).await.unwrap();
        assert_eq!(claims.sub, "a1");
        assert_eq!(claims.agent_type, "service");
        assert!(claims.roles.contains(&"agent:service".to_string()));
    }

    #[tokio::test]
    async fn test_validate_rejects_empty_token() {
        let engine = engine_with_agent(test_agent());
        let result = engine.validate("", Utc::now(), false).await;
        assert!(matches!(result, Err(CoreError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_issue_rejects_ineligible_agent() {
        let mut agent = test_agent();
        agent.status = AgentStatus::Suspended;
        let engine = engine_with_agent(agent);
        let result = engine
            .issue(
                IssueRequest {
                    agent_id: "a1".into(),
                    requested_roles: vec![],
                    requested_scopes: vec![],
                    with_refresh_token: false,
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(CoreError::NotActive)));
    }
}
