//! Unified application error model and its HTTP mapping.
//! Identity components and handlers return `AppError`; the HTTP layer turns it into
//! a `{"message": ...}` body with the matching status. Infrastructure variants carry
//! detail for the logs only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::identity::{EntropyError, HashError};
use crate::storage::StoreError;

pub const MSG_MISSING_AUTH: &str = "Authorization header required";
pub const MSG_UNAUTHENTICATED: &str = "Invalid or expired token";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MSG_NOT_TEAM_ADMIN: &str = "Only team admins can create tasks";
pub const MSG_INTERNAL: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed request input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Login failed; unknown email and wrong password are deliberately the same.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing authorization header")]
    MissingAuthorization,
    /// Token empty, unknown, malformed in storage, or expired.
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("hash failure: {0}")]
    Hash(#[from] HashError),
    #[error("{0}")]
    Entropy(#[from] EntropyError),
    /// Server-side misconfiguration or arithmetic limit; detail is for logs only.
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation<S: Into<String>>(msg: S) -> Self { AppError::Validation(msg.into()) }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self { AppError::Forbidden(msg.into()) }
    pub fn not_found<S: Into<String>>(msg: S) -> Self { AppError::NotFound(msg.into()) }
    pub fn conflict<S: Into<String>>(msg: S) -> Self { AppError::Conflict(msg.into()) }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal(msg.into()) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::InvalidCredentials | AppError::MissingAuthorization | AppError::Unauthenticated => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Store(_) | AppError::Hash(_) | AppError::Entropy(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::MissingAuthorization => "missing_authorization",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Store(_) => "store_error",
            AppError::Hash(_) => "hash_error",
            AppError::Entropy(_) => "entropy_error",
            AppError::Internal(_) => "internal",
        }
    }

    /// Text that is safe to hand to a client.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(m) | AppError::Forbidden(m) | AppError::NotFound(m) | AppError::Conflict(m) => m.clone(),
            AppError::InvalidCredentials => MSG_INVALID_CREDENTIALS.to_string(),
            AppError::MissingAuthorization => MSG_MISSING_AUTH.to_string(),
            AppError::Unauthenticated => MSG_UNAUTHENTICATED.to_string(),
            AppError::Store(_) | AppError::Hash(_) | AppError::Entropy(_) | AppError::Internal(_) => MSG_INTERNAL.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.http_status() >= 500 {
            error!(target: "agendum::server", code = self.code_str(), "request failed: {self}");
        }
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "message": self.client_message() }))).into_response()
    }
}
