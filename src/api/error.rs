//! HTTP error mapping.
//!
//! Domain errors become the `{ success: false, message, ... }` envelope the
//! frontend expects. Validation failures carry the full list of violated
//! fields; not-found never distinguishes foreign ownership from absence;
//! storage faults surface as a generic server error with the detail logged,
//! not leaked.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::task::{FieldError, TaskError};

#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(errors) => Self::Validation(errors),
            TaskError::NotFound => Self::NotFound("Task not found".to_string()),
            TaskError::Storage(e) => {
                tracing::error!("storage error: {}", e);
                Self::Internal("Server error".to_string())
            }
        }
    }
}

impl From<crate::store::StorageError> for ApiError {
    fn from(err: crate::store::StorageError) -> Self {
        tracing::error!("storage error: {}", err);
        Self::Internal("Server error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "message": "Validation errors",
                    "errors": errors,
                }),
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message }),
            ),
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": message }),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": message }),
            ),
            Self::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "message": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
