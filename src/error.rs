// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (exam window closed, attempts used up)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username, attempt already running)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Errors raised by the exam attempt lifecycle.
///
/// All variants are recoverable: the caller shows a message and may retry.
/// `NoLiveAttempt` is what a second, racing finalization observes.
#[derive(Debug)]
pub enum ExamError {
    AlreadyAttempting,
    AttemptLimitExceeded,
    WindowClosed,
    NoLiveAttempt,
    /// The question id is not part of the attempt's category.
    UnknownQuestion(i64),
    Storage(sqlx::Error),
}

impl fmt::Display for ExamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamError::AlreadyAttempting => write!(f, "An attempt is already in progress"),
            ExamError::AttemptLimitExceeded => write!(f, "No attempts left for this exam"),
            ExamError::WindowClosed => write!(f, "The exam is not open"),
            ExamError::NoLiveAttempt => write!(f, "No live attempt for this exam"),
            ExamError::UnknownQuestion(id) => write!(f, "Question {} is not part of this exam", id),
            ExamError::Storage(e) => write!(f, "Storage failure: {}", e),
        }
    }
}

impl std::error::Error for ExamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExamError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ExamError {
    fn from(err: sqlx::Error) -> Self {
        ExamError::Storage(err)
    }
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::AlreadyAttempting => AppError::Conflict(err.to_string()),
            ExamError::AttemptLimitExceeded | ExamError::WindowClosed => {
                AppError::Forbidden(err.to_string())
            }
            ExamError::NoLiveAttempt => AppError::NotFound(err.to_string()),
            ExamError::UnknownQuestion(_) => AppError::BadRequest(err.to_string()),
            ExamError::Storage(e) => {
                tracing::error!("Exam storage failure: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        }
    }
}
