use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use conduct_core::error::{self, ApiError, InputError, SessionError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Record not found (404)
    NotFound { message: String },
    /// No live session to operate on (409)
    NoActiveSession,
    /// Invalid session phase transition (409)
    SessionConflict { message: String },
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { message } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::NoActiveSession => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::NO_ACTIVE_SESSION.to_string(),
                    message: "No session is currently active".to_string(),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Start a session with POST /v1/sessions before logging incidents"
                            .to_string(),
                    ),
                },
            ),
            AppError::SessionConflict { message } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::SESSION_STATE_CONFLICT.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: Some(err.field().to_string()),
            received: None,
            docs_hint: None,
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::SessionConflict {
            message: err.to_string(),
        }
    }
}
