//! # Agent & Credential
//!
//! Core identity entities of the Agent Directory (spec §3, §4.4). An
//! `Agent` is any caller that can hold credentials and receive a token —
//! a service account, a human, an AI agent, or an MCP server.

use super::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of caller an [`Agent`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Service,
    Human,
    Ai,
    Mcp,
}

impl AgentKind {
    /// The `agent:{kind}` role automatically granted at issuance (§4.6.1
    /// step 4): `roles = caller-requested ∪ agent:{kind} ∪ ...`.
    pub fn implicit_role(&self) -> String {
        format!("agent:{}", self.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Mcp => "mcp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "service" => Some(Self::Service),
            "human" => Some(Self::Human),
            "ai" => Some(Self::Ai),
            "mcp" => Some(Self::Mcp),
            _ => None,
        }
    }
}

/// Lifecycle status of an [`Agent`] (§4.4 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Suspended,
    Revoked,
    Expired,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A single authentication factor attached to an [`Agent`] (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique within the owning agent.
    pub id: String,
    pub kind: CredentialKind,
    /// Opaque value: a password hash, an API-key hash, or ciphertext.
    /// Never the plaintext secret.
    pub opaque_value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Password,
    ApiKey,
    Certificate,
    Oauth2,
}

/// Identity of a caller that may hold credentials (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub kind: AgentKind,
    pub display_name: String,
    pub status: AgentStatus,
    pub tenant_id: String,
    pub credentials: Vec<Credential>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A requested status transition that the state machine (§4.4) forbids.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal agent status transition from {from:?} to {to:?}")]
pub struct IllegalTransition {
    pub from: AgentStatus,
    pub to: AgentStatus,
}

impl Agent {
    /// If `expires_at` has passed, the agent is treated as expired for all
    /// authorization purposes regardless of its stored `status` (spec §3
    /// invariant), and the stored status is lazily advanced to reflect
    /// that on next observation. Revoked agents are never revived by this
    /// check.
    pub fn observe(&mut self, now: DateTime<Utc>) {
        if self.status != AgentStatus::Revoked
            && self.expires_at.is_some_and(|exp| exp <= now)
            && self.status != AgentStatus::Expired
        {
            self.status = AgentStatus::Expired;
            self.updated_at = now;
        }
    }

    /// §4.4: `active -> suspended`.
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(AgentStatus::Suspended, now)
    }

    /// §4.4: `suspended -> active`, unless the agent has since expired by
    /// time, in which case it lands in `expired` instead of `active`.
    pub fn reactivate(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        if self.status != AgentStatus::Suspended {
            return Err(IllegalTransition {
                from: self.status,
                to: AgentStatus::Active,
            });
        }
        let target = if self.expires_at.is_some_and(|exp| exp <= now) {
            AgentStatus::Expired
        } else {
            AgentStatus::Active
        };
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// §4.4: any non-revoked status -> revoked. Forbidden out of `revoked`
    /// itself (terminal state).
    pub fn revoke(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(AgentStatus::Revoked, now)
    }

    fn transition(&mut self, to: AgentStatus, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        if self.status == AgentStatus::Revoked {
            return Err(IllegalTransition { from: self.status, to });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn add_credential(&mut self, credential: Credential, now: DateTime<Utc>) {
        self.credentials.retain(|c| c.id != credential.id);
        self.credentials.push(credential);
        self.updated_at = now;
    }

    pub fn revoke_credential(&mut self, credential_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.credentials.len();
        self.credentials.retain(|c| c.id != credential_id);
        let removed = self.credentials.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// `eligible-for-authorization(agent)` — spec §4.4's cross-cutting
    /// predicate, invoked by the Token Engine at issuance time and on
    /// freshness rechecks.
    pub fn is_eligible_for_authorization(&self, now: DateTime<Utc>) -> bool {
        if self.status != AgentStatus::Active {
            return false;
        }
        if self.expires_at.is_some_and(|exp| exp <= now) {
            return false;
        }
        self.credentials.iter().any(|c| !c.is_expired(now))
    }

    /// Deep copy for handing records to callers (spec §3 ownership note:
    /// "copies handed to callers are defensive and must not share mutable
    /// substructure"). `Agent` and `Metadata` are already fully owned
    /// value types, so `clone()` already satisfies this; the method exists
    /// to make the intent explicit at call sites.
    pub fn defensive_copy(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn agent(status: AgentStatus, expires_at: Option<DateTime<Utc>>) -> Agent {
        let now = Utc::now();
        Agent {
            id: "a1".into(),
            kind: AgentKind::Service,
            display_name: "svc".into(),
            status,
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
            expires_at,
        }
    }

    #[test]
    fn test_suspend_then_reactivate() {
        let mut a = agent(AgentStatus::Active, None);
        let now = Utc::now();
        a.suspend(now).unwrap();
        assert_eq!(a.status, AgentStatus::Suspended);
        a.reactivate(now).unwrap();
        assert_eq!(a.status, AgentStatus::Active);
    }

    #[test]
    fn test_reactivate_only_valid_from_suspended() {
        let mut a = agent(AgentStatus::Active, None);
        assert!(a.reactivate(Utc::now()).is_err());
    }

    #[test]
    fn test_reactivating_expired_agent_lands_in_expired() {
        let past = Utc::now() - Duration::hours(1);
        let mut a = agent(AgentStatus::Suspended, Some(past));
        a.reactivate(Utc::now()).unwrap();
        assert_eq!(a.status, AgentStatus::Expired);
    }

    #[test]
    fn test_nothing_transitions_out_of_revoked() {
        let mut a = agent(AgentStatus::Revoked, None);
        assert!(a.suspend(Utc::now()).is_err());
        assert!(a.revoke(Utc::now()).is_err());
    }

    #[test]
    fn test_observe_lazily_expires_past_due_agent() {
        let past = Utc::now() - Duration::hours(1);
        let mut a = agent(AgentStatus::Active, Some(past));
        a.observe(Utc::now());
        assert_eq!(a.status, AgentStatus::Expired);
    }

    #[test]
    fn test_observe_does_not_revive_revoked_agent() {
        let past = Utc::now() - Duration::hours(1);
        let mut a = agent(AgentStatus::Revoked, Some(past));
        a.observe(Utc::now());
        assert_eq!(a.status, AgentStatus::Revoked);
    }

    #[test]
    fn test_eligible_requires_active_unexpired_with_credential() {
        let a = agent(AgentStatus::Active, None);
        assert!(a.is_eligible_for_authorization(Utc::now()));

        let mut no_creds = agent(AgentStatus::Active, None);
        no_creds.credentials.clear();
        assert!(!no_creds.is_eligible_for_authorization(Utc::now()));

        let suspended = agent(AgentStatus::Suspended, None);
        assert!(!suspended.is_eligible_for_authorization(Utc::now()));
    }

    #[test]
    fn test_implicit_role_format() {
        assert_eq!(AgentKind::Service.implicit_role(), "agent:service");
        assert_eq!(AgentKind::Mcp.implicit_role(), "agent:mcp");
    }
}
