//! # Core Error Taxonomy
//!
//! Spec §7: every observable failure from any component collapses into one
//! of these eight kinds. Components never leak their backing-store error
//! type across their boundary — a `sqlx::Error` or `redis::RedisError`
//! becomes `CoreError::BackendUnavailable` (or `Internal`, if it signals a
//! programming error rather than an environment problem) before it escapes.

use shared::errors::InfraError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("agent or client is not active")]
    NotActive,

    #[error("token or credential has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: f64 },

    #[error("backend unavailable: {service}")]
    BackendUnavailable { service: String },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Constructs `Internal` with a message, the usual way call sites build
    /// this variant rather than spelling out the struct literal.
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal { message: message.into() }
    }

    pub fn backend_unavailable(service: impl Into<String>) -> Self {
        CoreError::BackendUnavailable { service: service.into() }
    }

    /// SCREAMING_SNAKE_CASE tag, the teacher's `ApiError::error_code`
    /// convention (spec §7 "every failure carries a kind").
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoreError::Unauthenticated => "UNAUTHENTICATED",
            CoreError::NotActive => "NOT_ACTIVE",
            CoreError::Expired => "EXPIRED",
            CoreError::Revoked => "REVOKED",
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            CoreError::Cancelled => "CANCELLED",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    /// HTTP status a transport layer would map this kind to (spec §7). The
    /// core never depends on an HTTP crate; this is just a hint kept next to
    /// the taxonomy it describes.
    pub fn http_status_hint(&self) -> u16 {
        match self {
            CoreError::InvalidArgument(_) => 400,
            CoreError::Unauthenticated | CoreError::Expired | CoreError::Revoked | CoreError::NotActive => 401,
            CoreError::RateLimited { .. } => 429,
            CoreError::BackendUnavailable { .. } => 503,
            CoreError::Cancelled | CoreError::Internal { .. } => 500,
        }
    }
}

impl From<InfraError> for CoreError {
    fn from(e: InfraError) -> Self {
        CoreError::backend_unavailable(match &e {
            InfraError::Database(_) => "database",
            InfraError::Redis(_) => "redis",
            InfraError::Config(_) => "config",
        })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(_: sqlx::Error) -> Self {
        CoreError::backend_unavailable("database")
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(_: redis::RedisError) -> Self {
        CoreError::backend_unavailable("redis")
    }
}

/// Malformed signature, expired claim, or any other decode failure all
/// collapse to `Unauthenticated` per spec §4.6.2 — a transport layer must
/// not be able to distinguish "bad signature" from "expired" from the
/// error alone, only from the `exp` claim it already has.
impl From<jsonwebtoken::errors::Error> for CoreError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => CoreError::Expired,
            _ => CoreError::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings_match_spec_taxonomy() {
        assert_eq!(CoreError::InvalidArgument("x".into()).error_code(), "INVALID_ARGUMENT");
        assert_eq!(CoreError::Unauthenticated.error_code(), "UNAUTHENTICATED");
        assert_eq!(CoreError::RateLimited { retry_after_seconds: 1.0 }.error_code(), "RATE_LIMITED");
    }

    #[test]
    fn test_infra_error_maps_to_backend_unavailable() {
        let infra = InfraError::Database(sqlx::Error::RowNotFound);
        let core: CoreError = infra.into();
        assert!(matches!(core, CoreError::BackendUnavailable { .. }));
    }

    #[test]
    fn test_expired_jwt_error_maps_to_expired() {
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &serde_json::json!({"exp": 1}),
            &jsonwebtoken::EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        let err = jsonwebtoken::decode::<serde_json::Value>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"k"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap_err();
        assert!(matches!(CoreError::from(err), CoreError::Expired));
    }
}
