//! # Agent Metadata
//!
//! Agents carry a free-form metadata map (string → arbitrary JSON-like
//! value, per spec §3). Rather than threading `serde_json::Value` straight
//! through the engine — which would let a typo in a claim name fail
//! silently at the point of use — we type it as a constrained sum per §9's
//! design note, with explicit accessors for the well-known claims
//! (`roles`, `scopes`, `capabilities`, `tenant_id`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A JSON-like value restricted to the shapes an agent's metadata map may
/// hold. `Map` is `BTreeMap` rather than `HashMap` so serialized metadata
/// (and therefore a token's claims) has a deterministic field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

/// Free-form metadata attached to an [`crate::domain::Agent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata(pub BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.0.insert(key.into(), value);
    }

    /// `roles` claim: a list of strings, or the empty list if absent. A
    /// present-but-wrong-shaped value is a type mismatch, not an absent
    /// claim (§9 "refuse to fail silently on type mismatches") — logged via
    /// `tracing::warn!` in [`Metadata::string_list`] rather than returned as
    /// a `Result`, since every accessor here is infallible by design.
    pub fn roles(&self) -> Vec<String> {
        self.string_list("roles")
    }

    /// `scopes` claim.
    pub fn scopes(&self) -> Vec<String> {
        self.string_list("scopes")
    }

    /// `capabilities` claim.
    pub fn capabilities(&self) -> Vec<String> {
        self.string_list("capabilities")
    }

    /// `tenant_id` claim, if present and a string.
    pub fn tenant_id(&self) -> Option<String> {
        match self.0.get("tenant_id") {
            Some(MetadataValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            None => Vec::new(),
            Some(MetadataValue::List(items)) => items
                .iter()
                .filter_map(|v| match v {
                    MetadataValue::String(s) => Some(s.clone()),
                    other => {
                        warn!(claim = key, value = ?other, "metadata claim list contains a non-string entry, dropping it");
                        None
                    }
                })
                .collect(),
            Some(other) => {
                warn!(claim = key, value = ?other, "metadata claim has the wrong shape, treating as absent");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_returns_empty_on_type_mismatch() {
        let mut meta = Metadata::new();
        meta.insert("roles", MetadataValue::String("not-a-list".into()));
        assert!(meta.roles().is_empty());
    }

    #[test]
    fn test_string_list_filters_non_string_entries() {
        let mut meta = Metadata::new();
        meta.insert(
            "scopes",
            MetadataValue::List(vec![
                MetadataValue::String("read:*".into()),
                MetadataValue::Number(1.0),
                MetadataValue::String("write:*".into()),
            ]),
        );
        assert_eq!(meta.scopes(), vec!["read:*", "write:*"]);
    }

    #[test]
    fn test_tenant_id_absent_returns_none() {
        let meta = Metadata::new();
        assert_eq!(meta.tenant_id(), None);
    }
}
