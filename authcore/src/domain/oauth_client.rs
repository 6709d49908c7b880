//! # OAuth2 Client
//!
//! Confidential client for the client-credentials grant (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Client {
    pub id: Uuid,
    /// bcrypt hash of the client secret. Never the plaintext secret.
    pub secret_hash: String,
    pub display_name: String,
    pub tenant_id: String,
    pub allowed_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl OAuth2Client {
    /// "A client is *active* iff not revoked and not expired" (spec §3).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// A requested scope set is permitted iff it is a subset of the
    /// client's allowed scopes (spec §4.7 step 4).
    pub fn permits_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|s| self.allowed_scopes.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn client(revoked_at: Option<DateTime<Utc>>, expires_at: Option<DateTime<Utc>>) -> OAuth2Client {
        OAuth2Client {
            id: Uuid::new_v4(),
            secret_hash: "$2b$...".into(),
            display_name: "svc-client".into(),
            tenant_id: "t1".into(),
            allowed_scopes: vec!["read:*".into(), "write:billing".into()],
            created_at: Utc::now(),
            expires_at,
            revoked_at,
        }
    }

    #[test]
    fn test_active_requires_not_revoked_and_not_expired() {
        assert!(client(None, None).is_active(Utc::now()));
        assert!(!client(Some(Utc::now()), None).is_active(Utc::now()));
        let past = Utc::now() - Duration::hours(1);
        assert!(!client(None, Some(past)).is_active(Utc::now()));
    }

    #[test]
    fn test_permits_scopes_subset() {
        let c = client(None, None);
        assert!(c.permits_scopes(&["read:*".to_string()]));
        assert!(!c.permits_scopes(&["admin:*".to_string()]));
        assert!(c.permits_scopes(&[]));
    }
}
