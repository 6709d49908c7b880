//! # Domain Layer
//!
//! Core entities of the authorization core (spec §3): agent identity,
//! OAuth2 clients, signing keys, token claims, and audit events. This layer
//! is **framework-agnostic** — no persistence, no distributed store, no
//! cryptographic side effects beyond what `SigningKey` itself carries.
//!
//! ## Module Structure
//!
//! | Module        | Purpose                                         |
//! |---------------|--------------------------------------------------|
//! | `metadata`    | Constrained JSON-like sum type for agent metadata|
//! | `agent`       | `Agent`, `Credential`, status state machine      |
//! | `oauth_client`| `OAuth2Client`                                   |
//! | `signing_key` | `SigningKey`, `Jwk`, `Jwks`                      |
//! | `token`       | `Claims`, `RefreshTokenRecord`, `TokenResponse`  |
//! | `audit`       | `AuditEvent`, hash-chain computation             |

pub mod agent;
pub mod audit;
pub mod metadata;
pub mod oauth_client;
pub mod signing_key;
pub mod token;

pub use agent::{Agent, AgentKind, AgentStatus, Credential, CredentialKind, IllegalTransition};
pub use audit::AuditEvent;
pub use metadata::{Metadata, MetadataValue};
pub use oauth_client::OAuth2Client;
pub use signing_key::{Jwk, Jwks, KeyStatus, SigningKey};
pub use token::{Claims, RefreshTokenRecord, TokenResponse};
