use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Structured error response shared by the API and CLI.
/// Every error carries enough information for the operator (or a script)
/// to understand what went wrong and how to fix it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const NO_ACTIVE_SESSION: &str = "no_active_session";
    pub const SESSION_STATE_CONFLICT: &str = "session_state_conflict";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Synchronous input rejection at the incident-creation boundary.
/// These are the only errors an operator sees while logging; everything
/// downstream (advisory, enrichment) degrades silently to the fallback.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("severity must be between 1 and 4, got {0}")]
    SeverityOutOfRange(u8),
    #[error("grade must be between 1 and 13, got {0}")]
    GradeOutOfRange(u8),
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("description is {len} characters, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },
    #[error("context is {len} characters, maximum is {max}")]
    ContextTooLong { len: usize, max: usize },
}

impl InputError {
    /// The request field the error refers to, for structured API responses.
    pub fn field(&self) -> &'static str {
        match self {
            InputError::UnknownCategory(_) => "category",
            InputError::SeverityOutOfRange(_) => "severity",
            InputError::GradeOutOfRange(_) => "grade",
            InputError::EmptyDescription | InputError::DescriptionTooLong { .. } => "description",
            InputError::ContextTooLong { .. } => "context",
        }
    }
}

/// Invalid session phase transition (e.g. resuming an ended session).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has already ended")]
    AlreadyEnded,
    #[error("session is not active")]
    NotActive,
    #[error("session is not paused")]
    NotPaused,
}
