//! Error types shared by the definition engine.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by workflow, template, version and draft operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Payload failed schema validation; carries every violation
    #[error("input has validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Referenced template, step template, version or draft does not exist
    #[error("{0}")]
    NotFound(String),

    /// Optimistic concurrency mismatch, or the record already exists
    #[error("{0}")]
    Conflict(String),

    /// Override policy violations, one message per forbidden change
    #[error("{}", .0.join("\n"))]
    Forbidden(Vec<String>),

    /// Caller lacks the rights for the operation
    #[error("{0}")]
    Unauthorized(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn not_found(message: impl Into<String>) -> Self {
        WorkflowError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        WorkflowError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(vec![message.into()])
    }

    /// Short machine-readable kind, used in API responses and audit logs
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::Unauthorized(_) => "unauthorized",
            WorkflowError::Store(_) => "store_error",
            WorkflowError::Serialization(_) => "serialization_error",
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_message_lists_every_violation() {
        let err = WorkflowError::Forbidden(vec![
            "workflow: \"desc\" cannot be changed".to_string(),
            "step \"s1\": config \"retries\" cannot be changed".to_string(),
        ]);
        let msg = err.to_string();
        assert_eq!(msg.lines().count(), 2);
        assert!(msg.contains("desc"));
        assert!(msg.contains("retries"));
    }

    #[test]
    fn test_validation_message_joins_violations() {
        let err = WorkflowError::Validation(vec!["/id: required".into(), "/v: minimum".into()]);
        assert_eq!(
            err.to_string(),
            "input has validation errors: /id: required; /v: minimum"
        );
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_store_error_converts() {
        let err: WorkflowError = StoreError::ConditionFailed.into();
        assert_eq!(err.kind(), "store_error");
    }
}
