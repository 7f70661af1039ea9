use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::{OrchestratorError, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::Orchestrator(err) => match err {
                OrchestratorError::State(e) => (StatusCode::CONFLICT, "illegal_state", e.to_string()),
                OrchestratorError::SessionClosed(_) => {
                    (StatusCode::CONFLICT, "session_closed", err.to_string())
                }
                OrchestratorError::SessionNotFound(_)
                | OrchestratorError::Database(db::DbError::SessionNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                OrchestratorError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg),
                _ => {
                    tracing::error!(error = %err, "Orchestrator error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        err.to_string(),
                    )
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Orchestrator(err.into())
    }
}

/// Failure while wiring the application together at startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to open database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}
