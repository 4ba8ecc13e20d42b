//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::WorkflowError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Failure reported by a definition service
    Workflow(WorkflowError),
    /// Caller identity headers are missing or malformed
    Unauthenticated(String),
    /// Bad request
    BadRequest(String),
    /// Internal server error
    InternalError(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Individual violations for validation and forbidden errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::Store(_) | WorkflowError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Workflow(err) => {
                let status = workflow_status(&err);
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", err);
                }
                let details = match &err {
                    WorkflowError::Validation(violations) | WorkflowError::Forbidden(violations) => {
                        violations.clone()
                    }
                    _ => Vec::new(),
                };
                (
                    status,
                    ErrorResponse {
                        error: err.kind().to_string(),
                        message: err.to_string(),
                        details,
                    },
                )
            }
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "unauthenticated".to_string(),
                    message,
                    details: Vec::new(),
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "bad_request".to_string(),
                    message,
                    details: Vec::new(),
                },
            ),
            ApiError::InternalError(message) => {
                tracing::error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal_error".to_string(),
                        message,
                        details: Vec::new(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
