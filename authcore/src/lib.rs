//! # authcore
//!
//! Core engine for a multi-tenant authorization and identity service:
//! agent identity, RS256 bearer tokens, OAuth2 client credentials, and the
//! supporting cache/rate-limit/revocation/audit substrate. This crate is a
//! library only — no transport framing (HTTP/gRPC) is implemented here; a
//! collaborator embeds these types behind whatever wire protocol it needs.
//!
//! ## Components
//!
//! | Module | Spec ref | Purpose |
//! |--------|----------|---------|
//! | [`cache`] | C1 | Local/distributed/hybrid/embedding cache substrate |
//! | [`rate_limiter`] | C2 | Token-bucket rate limiting |
//! | [`key_manager`] | C3 | RSA signing-key lifecycle |
//! | [`agent_directory`] | C4 | Agent identity and credentials |
//! | [`revocation`] | C5 | Revoked-token set |
//! | [`token_engine`] | C6 | Bearer token issue/validate/refresh/revoke |
//! | [`oauth_client_registry`] | C7 | OAuth2 client-credentials grant |
//! | [`audit_chain`] | C8 | Hash-chained audit log |

pub mod agent_directory;
pub mod audit_chain;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod key_manager;
pub mod oauth_client_registry;
pub mod rate_limiter;
pub mod revocation;
pub mod token_engine;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
