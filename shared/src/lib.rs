//! # Shared Infrastructure
//!
//! Ambient infrastructure used by the authorization core: configuration
//! loading, structured logging, the PostgreSQL pool, and the distributed-KV
//! client. Nothing in this crate knows anything about agents, tokens, or
//! signing keys — that domain logic lives entirely in `authcore`, which
//! depends on this crate rather than the other way around.
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Infrastructure error taxonomy | [`InfraError`], [`InfraResult`] |
//! | [`database`] | PostgreSQL connection pool | [`create_pool`](database::create_pool) |
//! | [`redis_client`] | Distributed KV client | [`RedisClient`](redis_client::RedisClient) |
//! | [`tracing_config`] | Structured logging setup | [`init_tracing`](tracing_config::init_tracing) |
//! | [`validation`] | Shared validator-crate helpers | [`validation::validators`] |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::{AppConfig, InfraResult};
//! use shared::{database, redis_client::RedisClient};
//!
//! #[tokio::main]
//! async fn main() -> InfraResult<()> {
//!     let config = AppConfig::from_env()?;
//!     let db_pool = database::create_pool(&config.database).await?;
//!     let redis = RedisClient::new(&config.redis).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod redis_client;
pub mod tracing_config;
pub mod validation;

pub use config::AppConfig;
pub use errors::{InfraError, InfraResult};
