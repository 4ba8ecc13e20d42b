//! Draft endpoints for workflows and workflow templates.
//!
//! Drafts are scoped to the caller: every route reads and writes only the
//! drafts owned by the `x-principal-uid` of the request.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::drafts::{WorkflowDraft, WorkflowTemplateDraft};
use crate::rest::caller::Caller;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::templates::WorkflowTemplateRecord;
use crate::workflows::WorkflowRecord;

fn publish_body(body: Option<Json<Value>>) -> Value {
    body.map_or_else(|| json!({}), |Json(value)| value)
}

/// List the caller's workflow drafts
#[utoipa::path(
    get,
    path = "/api/v1/workflow-drafts",
    tag = "Drafts",
    responses(
        (status = 200, description = "Caller's workflow drafts, by id", body = serde_json::Value),
        (status = 401, description = "Missing caller identity", body = ErrorResponse)
    )
)]
pub async fn list_workflow_drafts(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
) -> Result<Json<Vec<WorkflowDraft>>, ApiError> {
    Ok(Json(state.workflow_drafts.list_my_drafts(&ctx).await?))
}

/// Start editing a new or existing workflow
#[utoipa::path(
    post,
    path = "/api/v1/workflow-drafts",
    tag = "Drafts",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Draft created", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Workflow or template not found", body = ErrorResponse),
        (status = 409, description = "Draft or workflow already exists", body = ErrorResponse)
    )
)]
pub async fn create_workflow_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowDraft>, ApiError> {
    Ok(Json(state.workflow_drafts.create_draft(&ctx, payload).await?))
}

/// Get one of the caller's workflow drafts
#[utoipa::path(
    get,
    path = "/api/v1/workflow-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    responses(
        (status = 200, description = "Draft", body = serde_json::Value),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn get_workflow_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDraft>, ApiError> {
    Ok(Json(state.workflow_drafts.find_draft(&ctx, &id).await?))
}

/// Merge a partial workflow into a draft
#[utoipa::path(
    put,
    path = "/api/v1/workflow-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated draft", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn update_workflow_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowDraft>, ApiError> {
    Ok(Json(
        state.workflow_drafts.update_draft(&ctx, &id, payload).await?,
    ))
}

/// Publish a workflow draft as a version
#[utoipa::path(
    post,
    path = "/api/v1/workflow-drafts/{id}/publish",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    request_body(content = serde_json::Value, description = "Final changes to apply before publishing"),
    responses(
        (status = 200, description = "Published version record", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Override policy violations", body = ErrorResponse),
        (status = 404, description = "Draft not found", body = ErrorResponse),
        (status = 409, description = "Conflicting version", body = ErrorResponse)
    )
)]
pub async fn publish_workflow_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(
        state
            .workflow_drafts
            .publish_draft(&ctx, &id, publish_body(body))
            .await?,
    ))
}

/// Discard a workflow draft
#[utoipa::path(
    delete,
    path = "/api/v1/workflow-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    responses(
        (status = 200, description = "Draft deleted"),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn delete_workflow_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.workflow_drafts.delete_draft(&ctx, &id).await?;
    Ok(Json(json!({"id": id, "deleted": true})))
}

/// List the caller's workflow template drafts
#[utoipa::path(
    get,
    path = "/api/v1/workflow-template-drafts",
    tag = "Drafts",
    responses(
        (status = 200, description = "Caller's workflow template drafts, by id", body = serde_json::Value),
        (status = 401, description = "Missing caller identity", body = ErrorResponse)
    )
)]
pub async fn list_template_drafts(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
) -> Result<Json<Vec<WorkflowTemplateDraft>>, ApiError> {
    Ok(Json(state.template_drafts.list_my_drafts(&ctx).await?))
}

/// Start editing a new or existing workflow template
#[utoipa::path(
    post,
    path = "/api/v1/workflow-template-drafts",
    tag = "Drafts",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Draft created", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Workflow template not found", body = ErrorResponse),
        (status = 409, description = "Draft or template already exists", body = ErrorResponse)
    )
)]
pub async fn create_template_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowTemplateDraft>, ApiError> {
    Ok(Json(state.template_drafts.create_draft(&ctx, payload).await?))
}

/// Get one of the caller's workflow template drafts
#[utoipa::path(
    get,
    path = "/api/v1/workflow-template-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    responses(
        (status = 200, description = "Draft", body = serde_json::Value),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn get_template_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<Json<WorkflowTemplateDraft>, ApiError> {
    Ok(Json(state.template_drafts.find_draft(&ctx, &id).await?))
}

/// Merge a partial workflow template into a draft
#[utoipa::path(
    put,
    path = "/api/v1/workflow-template-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated draft", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn update_template_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowTemplateDraft>, ApiError> {
    Ok(Json(
        state.template_drafts.update_draft(&ctx, &id, payload).await?,
    ))
}

/// Publish a workflow template draft as a version
#[utoipa::path(
    post,
    path = "/api/v1/workflow-template-drafts/{id}/publish",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    request_body(content = serde_json::Value, description = "Final changes to apply before publishing"),
    responses(
        (status = 200, description = "Published version record", body = serde_json::Value),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Draft or step template not found", body = ErrorResponse),
        (status = 409, description = "Conflicting version", body = ErrorResponse)
    )
)]
pub async fn publish_template_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<WorkflowTemplateRecord>, ApiError> {
    Ok(Json(
        state
            .template_drafts
            .publish_draft(&ctx, &id, publish_body(body))
            .await?,
    ))
}

/// Discard a workflow template draft
#[utoipa::path(
    delete,
    path = "/api/v1/workflow-template-drafts/{id}",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "Draft id")
    ),
    responses(
        (status = 200, description = "Draft deleted"),
        (status = 404, description = "Draft not found", body = ErrorResponse)
    )
)]
pub async fn delete_template_draft(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.template_drafts.delete_draft(&ctx, &id).await?;
    Ok(Json(json!({"id": id, "deleted": true})))
}
