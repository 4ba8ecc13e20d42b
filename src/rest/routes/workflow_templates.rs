//! Workflow template endpoints.
//!
//! Plugin templates are read-only; writes create and update admin-authored
//! templates as versions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::rest::caller::Caller;
use crate::rest::dto::{TemplateListQuery, VersionQuery, WorkflowTemplateSummary};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::templates::{TemplateCatalog, WorkflowTemplate, WorkflowTemplateRecord};

/// List plugin and admin-authored workflow templates
#[utoipa::path(
    get,
    path = "/api/v1/workflow-templates",
    tag = "Workflow Templates",
    params(TemplateListQuery),
    responses(
        (status = 200, description = "Workflow templates", body = Vec<WorkflowTemplateSummary>)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<Vec<WorkflowTemplateSummary>>, ApiError> {
    let templates = state.templates.list_all(query.include_hidden).await?;
    Ok(Json(
        templates.iter().map(WorkflowTemplateSummary::from).collect(),
    ))
}

/// Get a workflow template, at a given version or current
#[utoipa::path(
    get,
    path = "/api/v1/workflow-templates/{id}",
    tag = "Workflow Templates",
    params(
        ("id" = String, Path, description = "Workflow template id"),
        VersionQuery
    ),
    responses(
        (status = 200, description = "Hydrated workflow template", body = serde_json::Value),
        (status = 404, description = "Workflow template not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<WorkflowTemplate>, ApiError> {
    let template = match query.v {
        Some(v) => state.templates.must_find_workflow_template(&id, v).await?,
        None => state.templates.must_find_current(&id).await?,
    };
    Ok(Json(template))
}

/// List stored versions of an admin-authored workflow template
#[utoipa::path(
    get,
    path = "/api/v1/workflow-templates/{id}/versions",
    tag = "Workflow Templates",
    params(
        ("id" = String, Path, description = "Workflow template id")
    ),
    responses(
        (status = 200, description = "Version records, ascending", body = serde_json::Value)
    )
)]
pub async fn versions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowTemplateRecord>>, ApiError> {
    Ok(Json(state.templates.list_versions(&id).await?))
}

/// Create a workflow template version
#[utoipa::path(
    post,
    path = "/api/v1/workflow-templates",
    tag = "Workflow Templates",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Version record", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Unknown step template", body = ErrorResponse),
        (status = 409, description = "Version exists or id is plugin-owned", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowTemplateRecord>, ApiError> {
    Ok(Json(state.templates.create_version(&ctx, payload).await?))
}

/// Replace a workflow template version, guarded by `rev`
#[utoipa::path(
    put,
    path = "/api/v1/workflow-templates/{id}",
    tag = "Workflow Templates",
    params(
        ("id" = String, Path, description = "Workflow template id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated version record", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Version not found", body = ErrorResponse),
        (status = 409, description = "Stale rev", body = ErrorResponse)
    )
)]
pub async fn update(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowTemplateRecord>, ApiError> {
    let payload = with_path_id(payload, &id)?;
    Ok(Json(state.templates.update_version(&ctx, payload).await?))
}

/// Path ids win over body ids
pub(crate) fn with_path_id(mut payload: Value, id: &str) -> Result<Value, ApiError> {
    let object = payload
        .as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("request body must be a JSON object".to_string()))?;
    object.insert("id".to_string(), Value::from(id));
    Ok(payload)
}
