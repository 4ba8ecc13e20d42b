//! API state management for the REST server.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::drafts::{WorkflowDraftService, WorkflowTemplateDraftService};
use crate::services::{AdminAuthorizer, Guards, JsonSchemaValidator, TracingAuditSink};
use crate::store::{InMemoryStore, Store};
use crate::templates::{
    BuiltinPlugin, DirectoryPlugin, TemplateCatalog, TemplatePlugin, TemplateRegistry,
    WorkflowTemplateService,
};
use crate::workflows::WorkflowService;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// Plugin templates, read-only after bootstrap
    pub registry: Arc<TemplateRegistry>,
    pub templates: WorkflowTemplateService,
    pub workflows: WorkflowService,
    pub workflow_drafts: WorkflowDraftService,
    pub template_drafts: WorkflowTemplateDraftService,
}

impl ApiState {
    /// Wire every service onto one store
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        registry: Arc<TemplateRegistry>,
        guards: Guards,
    ) -> Self {
        let templates = WorkflowTemplateService::new(
            Arc::clone(&store),
            config.store.workflow_templates.clone(),
            Arc::clone(&registry),
            guards.clone(),
        );
        let catalog: Arc<dyn TemplateCatalog> = Arc::new(templates.clone());
        let workflows = WorkflowService::new(
            Arc::clone(&store),
            config.store.workflows.clone(),
            Arc::clone(&catalog),
            guards.clone(),
        );
        let workflow_drafts = WorkflowDraftService::new(
            Arc::clone(&store),
            config.store.workflow_drafts.clone(),
            workflows.clone(),
            catalog,
            guards.clone(),
        );
        let template_drafts = WorkflowTemplateDraftService::new(
            store,
            config.store.workflow_template_drafts.clone(),
            templates.clone(),
            guards,
        );

        Self {
            registry,
            templates,
            workflows,
            workflow_drafts,
            template_drafts,
        }
    }

    /// Production wiring: in-memory store, builtin plus directory plugins,
    /// admin-only authorization and tracing audit
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(bootstrap_registry(config)?);
        let guards = Guards::new(
            Arc::new(AdminAuthorizer),
            Arc::new(JsonSchemaValidator::new().context("Failed to compile request schemas")?),
            Arc::new(TracingAuditSink),
        );
        Ok(Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            registry,
            guards,
        ))
    }
}

/// Load the builtin plugin and the configured templates directory
pub fn bootstrap_registry(config: &Config) -> Result<TemplateRegistry> {
    let plugins: Vec<Box<dyn TemplatePlugin>> = vec![
        Box::new(BuiltinPlugin),
        Box::new(DirectoryPlugin::new(config.templates_path())),
    ];
    TemplateRegistry::bootstrap(&plugins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_loads_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.templates = dir.path().to_string_lossy().to_string();

        let state = ApiState::from_config(&config).unwrap();
        assert!(state.registry.workflow_template("wt-empty", 1).is_some());
        assert!(state.registry.step_templates().count() >= 4);
    }
}
