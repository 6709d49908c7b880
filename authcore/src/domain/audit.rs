//! # Audit Event
//!
//! Per-tenant append-only audit event (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub actor: String,
    pub resource: String,
    pub action: String,
    pub outcome: String,
    pub previous_hash: String,
    pub self_hash: String,
}

/// Canonical-JSON view of an event with its hash omitted, the input to the
/// self-hash computation (spec §4.8: `SHA-256(canonical-json(event-without-hash)
/// ‖ previous-hash)`).
#[derive(Serialize)]
struct EventWithoutHash<'a> {
    id: i64,
    tenant_id: &'a str,
    timestamp: DateTime<Utc>,
    event_type: &'a str,
    actor: &'a str,
    resource: &'a str,
    action: &'a str,
    outcome: &'a str,
}

impl AuditEvent {
    /// Computes the self-hash binding every other field and the
    /// previous-hash, forming the per-tenant chain.
    pub fn compute_self_hash(
        id: i64,
        tenant_id: &str,
        timestamp: DateTime<Utc>,
        event_type: &str,
        actor: &str,
        resource: &str,
        action: &str,
        outcome: &str,
        previous_hash: &str,
    ) -> String {
        let canonical = EventWithoutHash {
            id,
            tenant_id,
            timestamp,
            event_type,
            actor,
            resource,
            action,
            outcome,
        };
        // `serde_json::to_vec` on a struct with no maps produces a stable
        // field order (declaration order), which is what "canonical-json"
        // requires here.
        let payload = serde_json::to_vec(&canonical).expect("audit event is always serializable");
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Recomputes this event's self-hash from its own fields and a given
    /// previous-hash, for chain validation.
    pub fn recompute_self_hash(&self, previous_hash: &str) -> String {
        Self::compute_self_hash(
            self.id,
            &self.tenant_id,
            self.timestamp,
            &self.event_type,
            &self.actor,
            &self.resource,
            &self.action,
            &self.outcome,
            previous_hash,
        )
    }

    /// True iff the stored `self_hash` matches what the fields + claimed
    /// `previous_hash` recompute to.
    pub fn verify(&self) -> bool {
        self.recompute_self_hash(&self.previous_hash) == self.self_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(id: i64, previous_hash: &str) -> AuditEvent {
        let timestamp = Utc::now();
        let self_hash = AuditEvent::compute_self_hash(
            id, "t1", timestamp, "token.issue", "a1", "token:jti-1", "issue", "success",
            previous_hash,
        );
        AuditEvent {
            id,
            tenant_id: "t1".into(),
            timestamp,
            event_type: "token.issue".into(),
            actor: "a1".into(),
            resource: "token:jti-1".into(),
            action: "issue".into(),
            outcome: "success".into(),
            previous_hash: previous_hash.to_string(),
            self_hash,
        }
    }

    #[test]
    fn test_fresh_chain_starts_from_empty_string() {
        let event = make_event(1, "");
        assert!(event.verify());
    }

    #[test]
    fn test_mutating_any_field_invalidates_hash() {
        let mut event = make_event(1, "");
        event.outcome = "failure".into();
        assert!(!event.verify());
    }

    #[test]
    fn test_chain_links_via_previous_hash() {
        let e1 = make_event(1, "");
        let e2 = make_event(2, &e1.self_hash);
        assert!(e1.verify());
        assert!(e2.verify());
        assert_ne!(e1.self_hash, e2.self_hash);
    }
}
