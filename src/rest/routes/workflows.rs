//! Workflow endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::rest::caller::Caller;
use crate::rest::dto::{DeleteWorkflowResponse, WorkflowSummary};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::routes::workflow_templates::with_path_id;
use crate::rest::state::ApiState;
use crate::workflows::WorkflowRecord;

/// List the latest version of every workflow
#[utoipa::path(
    get,
    path = "/api/v1/workflows",
    tag = "Workflows",
    responses(
        (status = 200, description = "Latest workflow versions, by id", body = Vec<WorkflowSummary>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<WorkflowSummary>>, ApiError> {
    let records = state.workflows.list_latest().await?;
    Ok(Json(records.iter().map(WorkflowSummary::from).collect()))
}

/// Create a workflow version from a manifest
#[utoipa::path(
    post,
    path = "/api/v1/workflows",
    tag = "Workflows",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Version record with the effective workflow", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Caller is not an admin", body = ErrorResponse),
        (status = 403, description = "Override policy violations", body = ErrorResponse),
        (status = 404, description = "Unknown template", body = ErrorResponse),
        (status = 409, description = "Version already exists", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflows.create_version(&ctx, payload).await?))
}

/// Get the latest version of a workflow
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Workflow id")
    ),
    responses(
        (status = 200, description = "Latest version record", body = serde_json::Value),
        (status = 404, description = "Workflow not found", body = ErrorResponse)
    )
)]
pub async fn get_latest(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflows.must_find_latest(&id).await?))
}

/// List every version of a workflow
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}/versions",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Workflow id")
    ),
    responses(
        (status = 200, description = "Version records, ascending", body = serde_json::Value)
    )
)]
pub async fn versions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowRecord>>, ApiError> {
    Ok(Json(state.workflows.list_versions(&id).await?))
}

/// Get one version of a workflow
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}/versions/{v}",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Workflow id"),
        ("v" = u32, Path, description = "Version")
    ),
    responses(
        (status = 200, description = "Version record", body = serde_json::Value),
        (status = 404, description = "Version not found", body = ErrorResponse)
    )
)]
pub async fn get_version(
    State(state): State<ApiState>,
    Path((id, v)): Path<(String, u32)>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflows.must_find_version(&id, v).await?))
}

/// Replace a workflow version, guarded by the `rev` in the body
#[utoipa::path(
    put,
    path = "/api/v1/workflows/{id}/versions/{v}",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Workflow id"),
        ("v" = u32, Path, description = "Version")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated version record", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Caller is not an admin", body = ErrorResponse),
        (status = 403, description = "Override policy violations", body = ErrorResponse),
        (status = 404, description = "Version not found", body = ErrorResponse),
        (status = 409, description = "Stale rev", body = ErrorResponse)
    )
)]
pub async fn update_version(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path((id, v)): Path<(String, u32)>,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    let mut payload = with_path_id(payload, &id)?;
    payload["v"] = Value::from(v);
    Ok(Json(state.workflows.update_version(&ctx, payload).await?))
}

/// Delete every version of a workflow
#[utoipa::path(
    delete,
    path = "/api/v1/workflows/{id}",
    tag = "Workflows",
    params(
        ("id" = String, Path, description = "Workflow id")
    ),
    responses(
        (status = 200, description = "Workflow deleted", body = DeleteWorkflowResponse),
        (status = 401, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<Json<DeleteWorkflowResponse>, ApiError> {
    let deleted_versions = state.workflows.delete_workflow(&ctx, &id).await?;
    Ok(Json(DeleteWorkflowResponse {
        id,
        deleted_versions,
    }))
}
