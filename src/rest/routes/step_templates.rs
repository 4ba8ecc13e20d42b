//! Step template endpoints. Read-only; step templates come from plugins.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::rest::dto::StepTemplateSummary;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::templates::StepTemplate;
use crate::error::WorkflowError;

/// List all step templates
#[utoipa::path(
    get,
    path = "/api/v1/step-templates",
    tag = "Step Templates",
    responses(
        (status = 200, description = "Every registered step template version", body = Vec<StepTemplateSummary>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Json<Vec<StepTemplateSummary>> {
    Json(
        state
            .registry
            .step_templates()
            .map(StepTemplateSummary::from)
            .collect(),
    )
}

/// List the versions of one step template
#[utoipa::path(
    get,
    path = "/api/v1/step-templates/{id}",
    tag = "Step Templates",
    params(
        ("id" = String, Path, description = "Step template id")
    ),
    responses(
        (status = 200, description = "Versions, ascending", body = serde_json::Value),
        (status = 404, description = "Step template not found", body = ErrorResponse)
    )
)]
pub async fn versions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StepTemplate>>, ApiError> {
    let versions: Vec<StepTemplate> = state
        .registry
        .step_template_versions(&id)
        .into_iter()
        .cloned()
        .collect();
    if versions.is_empty() {
        return Err(WorkflowError::not_found(format!("step template {} not found", id)).into());
    }
    Ok(Json(versions))
}

/// Get one step template version
#[utoipa::path(
    get,
    path = "/api/v1/step-templates/{id}/versions/{v}",
    tag = "Step Templates",
    params(
        ("id" = String, Path, description = "Step template id"),
        ("v" = u32, Path, description = "Version")
    ),
    responses(
        (status = 200, description = "Step template", body = serde_json::Value),
        (status = 404, description = "Step template not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path((id, v)): Path<(String, u32)>,
) -> Result<Json<StepTemplate>, ApiError> {
    state
        .registry
        .step_template(&id, v)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            WorkflowError::not_found(format!("step template {} v{} not found", id, v)).into()
        })
}
