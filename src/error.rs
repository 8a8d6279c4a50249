//! Application error types
//!
//! Errors are grouped by origin: external services (payment processor),
//! infrastructure (configuration, database), and domain rules (settlement).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::database::error::DatabaseError;

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Errors originating from external services
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    #[error("{service} rate limit exceeded")]
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

/// Errors originating from infrastructure concerns
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors raised by settlement rules themselves
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("payment {payment_id} not found")]
    PaymentNotFound { payment_id: String },
    #[error("amount mismatch for payment {payment_id}: expected {expected} minor units, processor reported {actual}")]
    AmountMismatch {
        payment_id: String,
        expected: i64,
        actual: i64,
    },
    #[error("invalid payment metadata: {message}")]
    InvalidMetadata { message: String },
}

#[derive(Debug, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error("malformed request payload: {0}")]
    BadPayload(#[from] serde_json::Error),
}

/// Top-level application error
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct AppError {
    pub kind: AppErrorKind,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self { kind }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
            err,
        )))
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        Self::new(AppErrorKind::Settlement(err))
    }
}

impl From<ExternalError> for AppError {
    fn from(err: ExternalError) -> Self {
        Self::new(AppErrorKind::External(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(AppErrorKind::BadPayload(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.kind {
            AppErrorKind::BadPayload(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Settlement(SettlementError::PaymentNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Never leak internal detail on 500s
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
