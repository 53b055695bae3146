use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::auth::{password::HashError, repo::RepoError, validation::ValidationError};

/// Every failure a handler can return. Each variant maps to exactly one
/// status/message pair; internal details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid request body")]
    MalformedBody(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthenticated,
    #[error("email already registered")]
    Conflict,
    #[error("email already verified")]
    AlreadyVerified,
    #[error("email does not match the authenticated user")]
    EmailMismatch,
    #[error("invalid or expired verification token")]
    InvalidToken,
    #[error("failed to send verification email")]
    EmailDelivery(#[source] anyhow::Error),
    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::MalformedBody(_)
            | AppError::AlreadyVerified
            | AppError::EmailMismatch
            | AppError::InvalidToken => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AppError::Conflict,
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<HashError> for AppError {
    fn from(e: HashError) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::EmailDelivery(e) | AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), %status, "request failed");
            }
            AppError::MalformedBody(detail) => {
                warn!(detail = %detail, "rejected request body");
            }
            _ => {}
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
