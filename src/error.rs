//! Error types for the FriendGraph engine
//!
//! One `thiserror` hierarchy for the whole crate:
//! - argument validation failures surface before any provider is touched
//! - cancellation and deadline expiry are distinct from "no recommendations"
//! - provider outages are fatal for a request and never read as empty data
//! - HTTP status code mapping for API responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

use crate::recommendation::providers::ProviderError;

/// Result type alias for FriendGraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the FriendGraph engine
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config {
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: &'static str },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },

    // ========================================================================
    // Database Errors
    // ========================================================================
    #[error("Database error: {message}")]
    Database {
        message: Cow<'static, str>,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Database connection pool exhausted")]
    PoolExhausted,

    #[error("Migration error: {0}")]
    Migration(String),

    // ========================================================================
    // Recommendation Engine Errors
    // ========================================================================
    #[error("Invalid argument {argument}: {message}")]
    InvalidArgument {
        argument: &'static str,
        message: Cow<'static, str>,
    },

    #[error("Social distance search cancelled")]
    Cancelled,

    #[error("Social distance search exceeded its deadline after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("Provider unavailable: {provider}")]
    ProviderUnavailable {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Internal server error")]
    Internal {
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    // ========================================================================
    // Constructors for common error patterns
    // ========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(argument: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    /// Wrap a provider failure; the provider name ends up in logs and API responses
    pub fn provider_unavailable(provider: &'static str, source: ProviderError) -> Self {
        Self::ProviderUnavailable { provider, source }
    }

    // ========================================================================
    // Error Classification
    // ========================================================================

    /// Returns true if this error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database { .. }
                | Error::PoolExhausted
                | Error::DeadlineExceeded { .. }
                | Error::ProviderUnavailable { .. }
        )
    }

    /// Returns true if this error should be logged at error level
    pub fn is_error_level(&self) -> bool {
        matches!(
            self,
            Error::Database { .. }
                | Error::ProviderUnavailable { .. }
                | Error::Internal { .. }
                | Error::Migration(_)
        )
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Error::ProviderUnavailable { .. } | Error::PoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            // nginx convention for "client went away / request aborted"
            Error::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } | Error::MissingEnvVar { .. } | Error::InvalidConfig { .. } => {
                "CONFIG_ERROR"
            }
            Error::Database { .. } | Error::PoolExhausted | Error::Migration(_) => {
                "DATABASE_ERROR"
            }
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::Cancelled => "CANCELLED",
            Error::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Error::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Error Response for API
// ============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Don't expose internal error details in production
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => Error::PoolExhausted,
            _ => Error::Database {
                message: err.to_string().into(),
                source: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::PoolExhausted.is_retryable());
        assert!(Error::DeadlineExceeded { elapsed_ms: 10 }.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::invalid_argument("page", "must be >= 0").is_retryable());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::invalid_argument("size", "must be > 0").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::provider_unavailable(
                "friendship",
                ProviderError::unavailable("friendship", "connection refused")
            )
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::DeadlineExceeded { elapsed_ms: 2000 }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(Error::Cancelled.status_code().as_u16(), 499);
        assert_eq!(
            Error::Internal { source: None }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cancelled_and_deadline_have_distinct_codes() {
        assert_eq!(Error::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            Error::DeadlineExceeded { elapsed_ms: 1 }.error_code(),
            "DEADLINE_EXCEEDED"
        );
    }
}
