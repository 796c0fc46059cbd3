// rest/error.rs — domain error → HTTP response mapping.
//
// Validation and not-found are expected outcomes and carry enough detail to
// correct the request. Store failures are logged server-side and surfaced
// as an opaque 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::identity::AuthError;
use crate::tasks::TaskError;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Task(TaskError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        ApiError::Task(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(e) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": e.to_string(), "reason": e.reason() })),
            )
                .into_response(),
            ApiError::Task(TaskError::Validation(e)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "validation failed", "errors": e.violations })),
            )
                .into_response(),
            ApiError::Task(TaskError::NotFound) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "task not found" })),
            )
                .into_response(),
            ApiError::Task(TaskError::Store(e)) => {
                error!(error = ?e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}
