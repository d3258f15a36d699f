use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::context::ingest::SizeLimitError;
use crate::export::merge::MergeError;
use crate::generation::session::SessionError;
use crate::llm_client::GenerationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    SizeLimit(#[from] SizeLimitError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::SizeLimit(e) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "SIZE_LIMIT_EXCEEDED",
                e.to_string(),
            ),
            AppError::Generation(GenerationError::Cancelled) => (
                StatusCode::CONFLICT,
                "CANCELLED",
                "The generation was cancelled".to_string(),
            ),
            AppError::Generation(e) => {
                tracing::error!("Generation error: {e}");
                (StatusCode::BAD_GATEWAY, e.kind(), e.to_string())
            }
            AppError::Session(e @ SessionError::Busy) => {
                (StatusCode::CONFLICT, "SESSION_BUSY", e.to_string())
            }
            AppError::Session(e @ SessionError::Stale) => {
                (StatusCode::CONFLICT, "CANCELLED", e.to_string())
            }
            AppError::Session(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Merge(e) => {
                tracing::warn!("Merge rejected: {e}");
                (StatusCode::UNPROCESSABLE_ENTITY, "MERGE_ERROR", e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
