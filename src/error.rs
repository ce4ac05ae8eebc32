//! Error taxonomy shared by the services and the HTTP boundary.
//!
//! Services return [`LedgerError`]; the actix `ResponseError` impl turns each
//! kind into its status code and an `{"error": message}` body, which is the
//! shape the frontend reads.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    /// A unique field is already taken.
    #[error("{0}")]
    Conflict(String),
    /// Bad credentials or a missing, expired or malformed token.
    #[error("{0}")]
    Authentication(String),
    /// The caller has no rights over the resource.
    #[error("{0}")]
    Authorization(String),
    /// A referenced user or expense does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Storage or hashing failure. Never shown to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }
}

/// Failures reported by ledger store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{field} is already taken")]
    Conflict { field: &'static str },
    #[error(transparent)]
    Backend(#[from] mongodb::error::Error),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => {
                LedgerError::Conflict(format!("{field} is already taken"))
            }
            StoreError::Backend(err) => LedgerError::Internal(err.to_string()),
        }
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Authorization(_) => StatusCode::FORBIDDEN,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LedgerError::Internal(detail) => {
                error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
