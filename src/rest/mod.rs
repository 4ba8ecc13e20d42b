//! REST API for workflow and workflow template administration.
//!
//! Every mutating route reads the caller from the `x-principal-*` headers
//! and passes it to the service layer, which authorizes, validates and
//! audits the operation.

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod caller;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use caller::Caller;
pub use openapi::ApiDoc;
pub use state::ApiState;

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::health::status))
        // Step templates
        .route("/api/v1/step-templates", get(routes::step_templates::list))
        .route(
            "/api/v1/step-templates/:id",
            get(routes::step_templates::versions),
        )
        .route(
            "/api/v1/step-templates/:id/versions/:v",
            get(routes::step_templates::get_one),
        )
        // Workflow templates
        .route(
            "/api/v1/workflow-templates",
            get(routes::workflow_templates::list).post(routes::workflow_templates::create),
        )
        .route(
            "/api/v1/workflow-templates/:id",
            get(routes::workflow_templates::get_one).put(routes::workflow_templates::update),
        )
        .route(
            "/api/v1/workflow-templates/:id/versions",
            get(routes::workflow_templates::versions),
        )
        // Workflows
        .route(
            "/api/v1/workflows",
            get(routes::workflows::list).post(routes::workflows::create),
        )
        .route(
            "/api/v1/workflows/:id",
            get(routes::workflows::get_latest).delete(routes::workflows::delete),
        )
        .route(
            "/api/v1/workflows/:id/versions",
            get(routes::workflows::versions),
        )
        .route(
            "/api/v1/workflows/:id/versions/:v",
            get(routes::workflows::get_version).put(routes::workflows::update_version),
        )
        // Workflow drafts
        .route(
            "/api/v1/workflow-drafts",
            get(routes::drafts::list_workflow_drafts).post(routes::drafts::create_workflow_draft),
        )
        .route(
            "/api/v1/workflow-drafts/:id",
            get(routes::drafts::get_workflow_draft)
                .put(routes::drafts::update_workflow_draft)
                .delete(routes::drafts::delete_workflow_draft),
        )
        .route(
            "/api/v1/workflow-drafts/:id/publish",
            post(routes::drafts::publish_workflow_draft),
        )
        // Workflow template drafts
        .route(
            "/api/v1/workflow-template-drafts",
            get(routes::drafts::list_template_drafts).post(routes::drafts::create_template_draft),
        )
        .route(
            "/api/v1/workflow-template-drafts/:id",
            get(routes::drafts::get_template_draft)
                .put(routes::drafts::update_template_draft)
                .delete(routes::drafts::delete_template_draft),
        )
        .route(
            "/api/v1/workflow-template-drafts/:id/publish",
            post(routes::drafts::publish_template_draft),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until ctrl-c
pub async fn serve(state: ApiState, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down REST API");
        })
        .await
        .context("REST API server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_build_router() {
        let state = ApiState::from_config(&Config::default()).unwrap();
        let _router = build_router(state);
    }
}
