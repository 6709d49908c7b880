//! # Agent Directory (C4)
//!
//! Agent registration, lookup, status transitions, and credential
//! management (spec §4.4). The repository trait is the injection seam the
//! spec's §9 design note calls for — "global state... modeled as explicit
//! injected dependencies, not ambient state, so tests can substitute
//! deterministic doubles" — grounded in the teacher's
//! `repository::UserRepository` trait + `mockall` double pattern.

use crate::domain::agent::{Agent, AgentKind, AgentStatus, Credential, CredentialKind};
use crate::domain::metadata::{Metadata, MetadataValue};
use crate::error::{CoreError, CoreResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use shared::operation_span;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Storage seam for agent records (spec §4.4). A `PgAgentRepository`
/// implements this against Postgres; tests substitute an in-memory or
/// `mockall`-generated double.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, agent: &Agent) -> CoreResult<()>;
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Agent>>;
    async fn update(&self, agent: &Agent) -> CoreResult<()>;
    async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<AgentStatus>,
        kind: Option<AgentKind>,
    ) -> CoreResult<Vec<Agent>>;
}

/// Raw row shape of the `agents` table. `kind`/`status` are stored as their
/// `as_str()` text form; `metadata`/`credentials` are `jsonb` columns,
/// decoded via `sqlx::types::Json` rather than hand-rolled `serde_json`
/// calls, matching the teacher's `FromRow`-derived entities.
#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    kind: String,
    display_name: String,
    status: String,
    tenant_id: String,
    metadata: Json<BTreeMap<String, MetadataValue>>,
    credentials: Json<Vec<Credential>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<AgentRow> for Agent {
    type Error = CoreError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: row.id,
            kind: AgentKind::from_str(&row.kind).ok_or_else(|| CoreError::internal("unknown agent kind in storage"))?,
            display_name: row.display_name,
            status: AgentStatus::from_str(&row.status).ok_or_else(|| CoreError::internal("unknown agent status in storage"))?,
            tenant_id: row.tenant_id,
            credentials: row.credentials.0,
            metadata: Metadata(row.metadata.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

const AGENT_COLUMNS: &str =
    "id, kind, display_name, status, tenant_id, metadata, credentials, created_at, updated_at, expires_at";

/// `sqlx`-backed implementation of `AgentRepository`, grounded in the
/// teacher's `PgUserRepository`.
pub struct PgAgentRepository {
    pool: PgPool,
}

impl PgAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for PgAgentRepository {
    async fn insert(&self, agent: &Agent) -> CoreResult<()> {
        let metadata_json = serde_json::to_value(&agent.metadata.0).map_err(|_| CoreError::internal("metadata serialization failed"))?;
        let credentials_json = serde_json::to_value(&agent.credentials).map_err(|_| CoreError::internal("credential serialization failed"))?;
        sqlx::query(
            "INSERT INTO agents (id, kind, display_name, status, tenant_id, metadata, credentials, created_at, updated_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&agent.id)
        .bind(agent.kind.as_str())
        .bind(&agent.display_name)
        .bind(agent.status.as_str())
        .bind(&agent.tenant_id)
        .bind(metadata_json)
        .bind(credentials_json)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .bind(agent.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::from(shared::errors::InfraError::Database(e)))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::from(shared::errors::InfraError::Database(e)))?;
        row.map(Agent::try_from).transpose()
    }

    async fn update(&self, agent: &Agent) -> CoreResult<()> {
        let metadata_json = serde_json::to_value(&agent.metadata.0).map_err(|_| CoreError::internal("metadata serialization failed"))?;
        let credentials_json = serde_json::to_value(&agent.credentials).map_err(|_| CoreError::internal("credential serialization failed"))?;
        sqlx::query(
            "UPDATE agents SET
                kind = $2, display_name = $3, status = $4, tenant_id = $5,
                metadata = $6, credentials = $7, updated_at = $8, expires_at = $9
             WHERE id = $1",
        )
        .bind(&agent.id)
        .bind(agent.kind.as_str())
        .bind(&agent.display_name)
        .bind(agent.status.as_str())
        .bind(&agent.tenant_id)
        .bind(metadata_json)
        .bind(credentials_json)
        .bind(agent.updated_at)
        .bind(agent.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::from(shared::errors::InfraError::Database(e)))?;
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<AgentStatus>,
        kind: Option<AgentKind>,
    ) -> CoreResult<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents
             WHERE ($1::text IS NULL OR tenant_id = $1)
               AND ($2::text IS NULL OR status = $2)
               AND ($3::text IS NULL OR kind = $3)
             ORDER BY created_at"
        ))
        .bind(tenant_id)
        .bind(status.map(|s| s.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::from(shared::errors::InfraError::Database(e)))?;
        rows.into_iter().map(Agent::try_from).collect()
    }
}

/// Service layer over an `AgentRepository`, owning the status state machine
/// and credential hashing policy (spec §4.4).
pub struct AgentDirectory {
    repository: Arc<dyn AgentRepository>,
}

impl AgentDirectory {
    pub fn new(repository: Arc<dyn AgentRepository>) -> Self {
        Self { repository }
    }

    pub async fn register(
        &self,
        kind: AgentKind,
        display_name: String,
        tenant_id: String,
        metadata: Metadata,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<Agent> {
        if display_name.trim().is_empty() {
            return Err(CoreError::InvalidArgument("display_name must not be blank".into()));
        }
        let agent = Agent {
            id: Uuid::new_v4().to_string(),
            kind,
            display_name,
            status: AgentStatus::Active,
            tenant_id,
            credentials: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
            expires_at,
        };
        self.repository.insert(&agent).await?;
        Ok(agent)
    }

    /// Fetches an agent and lazily applies time-based expiry (spec §4.4
    /// "reads return deep copies").
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        let span = operation_span!("agent_get", id);
        async move {
            let mut agent = self
                .repository
                .find_by_id(id)
                .await?
                .ok_or(CoreError::Unauthenticated)?;
            let before = agent.status;
            agent.observe(now);
            if agent.status != before {
                self.repository.update(&agent).await?;
            }
            Ok(agent.defensive_copy())
        }
        .instrument(span)
        .await
    }

    pub async fn suspend(&self, id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        self.transition(id, now, |agent, now| agent.suspend(now)).await
    }

    pub async fn reactivate(&self, id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        self.transition(id, now, |agent, now| agent.reactivate(now)).await
    }

    pub async fn revoke(&self, id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        self.transition(id, now, |agent, now| agent.revoke(now)).await
    }

    async fn transition(
        &self,
        id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Agent, DateTime<Utc>) -> Result<(), crate::domain::agent::IllegalTransition>,
    ) -> CoreResult<Agent> {
        let span = operation_span!("agent_transition", id);
        async move {
            let mut agent = self
                .repository
                .find_by_id(id)
                .await?
                .ok_or(CoreError::Unauthenticated)?;
            f(&mut agent, now).map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
            self.repository.update(&agent).await?;
            Ok(agent.defensive_copy())
        }
        .instrument(span)
        .await
    }

    pub async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<AgentStatus>,
        kind: Option<AgentKind>,
    ) -> CoreResult<Vec<Agent>> {
        self.repository.list(tenant_id, status, kind).await
    }

    /// Adds a credential, hashing `raw_secret` according to its kind:
    /// Argon2id for passwords (matching the teacher's own hasher),
    /// SHA-256 for API keys (a lookup hash, not a slow KDF — API keys are
    /// high-entropy and compared by equality, not brute-force-resistant
    /// storage), and stored opaque for certificate/OAuth2 credentials whose
    /// "secret" is a public fingerprint or external reference.
    pub async fn add_credential(
        &self,
        id: &str,
        kind: CredentialKind,
        raw_secret: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<Agent> {
        let opaque_value = Self::hash_credential(kind, raw_secret)?;
        let mut agent = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(CoreError::Unauthenticated)?;
        agent.add_credential(
            Credential {
                id: Uuid::new_v4().to_string(),
                kind,
                opaque_value,
                issued_at: now,
                expires_at,
            },
            now,
        );
        self.repository.update(&agent).await?;
        Ok(agent.defensive_copy())
    }

    pub async fn revoke_credential(&self, id: &str, credential_id: &str, now: DateTime<Utc>) -> CoreResult<Agent> {
        let mut agent = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(CoreError::Unauthenticated)?;
        agent.revoke_credential(credential_id, now);
        self.repository.update(&agent).await?;
        Ok(agent.defensive_copy())
    }

    fn hash_credential(kind: CredentialKind, raw_secret: &str) -> CoreResult<String> {
        match kind {
            CredentialKind::Password => {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(raw_secret.as_bytes(), &salt)
                    .map(|h| h.to_string())
                    .map_err(|_| CoreError::internal("password hashing failed"))
            }
            CredentialKind::ApiKey => {
                let mut hasher = Sha256::new();
                hasher.update(raw_secret.as_bytes());
                Ok(hex::encode(hasher.finalize()))
            }
            CredentialKind::Certificate | CredentialKind::Oauth2 => Ok(raw_secret.to_string()),
        }
    }

    /// Verifies a plaintext secret against a stored Argon2 password hash.
    pub fn verify_password(opaque_value: &str, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(opaque_value) else {
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }

    /// Verifies a plaintext API key against its stored SHA-256 hash.
    pub fn verify_api_key(opaque_value: &str, candidate: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(candidate.as_bytes());
        hex::encode(hasher.finalize()) == opaque_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = AgentDirectory::hash_credential(CredentialKind::Password, "s3cret").unwrap();
        assert!(AgentDirectory::verify_password(&hash, "s3cret"));
        assert!(!AgentDirectory::verify_password(&hash, "wrong"));
    }

    #[test]
    fn test_api_key_hash_round_trip() {
        let hash = AgentDirectory::hash_credential(CredentialKind::ApiKey, "key-123").unwrap();
        assert!(AgentDirectory::verify_api_key(&hash, "key-123"));
        assert!(!AgentDirectory::verify_api_key(&hash, "key-456"));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_display_name() {
        let mut mock = MockAgentRepository::new();
        mock.expect_insert().never();
        let directory = AgentDirectory::new(Arc::new(mock));
        let result = directory
            .register(
                AgentKind::Service,
                "   ".into(),
                "tenant-1".into(),
                Metadata::new(),
                None,
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_register_inserts_active_agent() {
        let mut mock = MockAgentRepository::new();
        mock.expect_insert().returning(|_| Box::pin(async { Ok(()) }));
        let directory = AgentDirectory::new(Arc::new(mock));
        let agent = directory
            .register(
                AgentKind::Service,
                "svc-1".into(),
                "tenant-1".into(),
                Metadata::new(),
                None,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Active);
    }
}
