use crate::orchestration::ComposerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// A stack rule or form check rejected the operation.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The CartSmart backend rejected or failed the call.
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ComposerError> for AppError {
    fn from(err: ComposerError) -> Self {
        match err {
            ComposerError::Selection(e) => AppError::Validation(e.to_string()),
            ComposerError::Submission(e) => AppError::Validation(e.to_string()),
            ComposerError::InvalidPrice(_) | ComposerError::NotAStack(_) => {
                AppError::Validation(err.to_string())
            }
            ComposerError::Api(e) if e.is_not_found() => AppError::NotFound(e.user_message()),
            ComposerError::Api(e) => AppError::Upstream(e.user_message()),
            ComposerError::SessionNotFound(_) | ComposerError::DealNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            ComposerError::AlreadyLoading | ComposerError::AlreadySubmitting => {
                AppError::Conflict(err.to_string())
            }
            ComposerError::TaskFailed(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
