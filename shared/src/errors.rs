//! # Infrastructure Error Types
//!
//! Thin error taxonomy for the ambient infrastructure this crate provides:
//! database pooling and distributed-KV connectivity. This is deliberately
//! narrower than a full API error type — there is no HTTP/gRPC transport in
//! this workspace, so there is nothing here that maps errors to status codes.
//! The authorization core's own error taxonomy (the one a caller of
//! `authcore` actually observes) lives in `authcore::error::CoreError`, which
//! wraps these infrastructure errors at its boundary.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::errors::{InfraError, InfraResult};
//!
//! async fn ping(pool: &sqlx::PgPool) -> InfraResult<()> {
//!     sqlx::query("SELECT 1").execute(pool).await?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for infrastructure-level operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Errors surfaced by the ambient infrastructure (database pool, distributed
/// KV connection, configuration loading). Collaborators that sit above this
/// crate translate these into their own error taxonomy rather than exposing
/// them directly.
#[derive(Debug, Error)]
pub enum InfraError {
    /// PostgreSQL query or pool setup failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Distributed KV (Redis-compatible) operation failed.
    #[error("distributed store error")]
    Redis(#[from] redis::RedisError),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error")]
    Config(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infra_error_messages_are_generic() {
        // Infrastructure errors never leak backend-specific detail in their
        // `Display` form — callers log the source error separately via
        // `tracing` and expose only the generic message upward.
        let err = InfraError::Config(config::ConfigError::Message("boom".into()));
        assert_eq!(err.to_string(), "configuration error");
    }
}
