//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    DeleteWorkflowResponse, HealthResponse, StatusResponse, StepTemplateSummary,
    WorkflowSummary, WorkflowTemplateSummary,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the workflow admin REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workflow Admin API",
        description = "Versioned workflows, workflow templates and drafts with override policies.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::status,
        // Step templates
        crate::rest::routes::step_templates::list,
        crate::rest::routes::step_templates::versions,
        crate::rest::routes::step_templates::get_one,
        // Workflow templates
        crate::rest::routes::workflow_templates::list,
        crate::rest::routes::workflow_templates::get_one,
        crate::rest::routes::workflow_templates::versions,
        crate::rest::routes::workflow_templates::create,
        crate::rest::routes::workflow_templates::update,
        // Workflows
        crate::rest::routes::workflows::list,
        crate::rest::routes::workflows::create,
        crate::rest::routes::workflows::get_latest,
        crate::rest::routes::workflows::versions,
        crate::rest::routes::workflows::get_version,
        crate::rest::routes::workflows::update_version,
        crate::rest::routes::workflows::delete,
        // Drafts
        crate::rest::routes::drafts::list_workflow_drafts,
        crate::rest::routes::drafts::create_workflow_draft,
        crate::rest::routes::drafts::get_workflow_draft,
        crate::rest::routes::drafts::update_workflow_draft,
        crate::rest::routes::drafts::publish_workflow_draft,
        crate::rest::routes::drafts::delete_workflow_draft,
        crate::rest::routes::drafts::list_template_drafts,
        crate::rest::routes::drafts::create_template_draft,
        crate::rest::routes::drafts::get_template_draft,
        crate::rest::routes::drafts::update_template_draft,
        crate::rest::routes::drafts::publish_template_draft,
        crate::rest::routes::drafts::delete_template_draft,
    ),
    components(
        schemas(
            HealthResponse,
            StatusResponse,
            StepTemplateSummary,
            WorkflowTemplateSummary,
            WorkflowSummary,
            DeleteWorkflowResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check and status endpoints"),
        (name = "Step Templates", description = "Plugin-provided step templates"),
        (name = "Workflow Templates", description = "Plugin and admin-authored workflow templates"),
        (name = "Workflows", description = "Versioned workflow definitions"),
        (name = "Drafts", description = "Per-user working copies of workflows and templates"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }

    /// Generate the OpenAPI specification as a YAML string
    pub fn yaml() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::openapi())
    }
}
