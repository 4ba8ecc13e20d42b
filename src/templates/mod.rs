//! Step templates, workflow templates and the catalog they are served from
//!
//! Plugin-contributed definitions live in the [`TemplateRegistry`], which is
//! filled once at startup and read-only afterwards. Admin-authored workflow
//! templates are stored as versions and served by
//! [`WorkflowTemplateService`], which also implements [`TemplateCatalog`] by
//! consulting the registry first.

pub mod loader;
pub mod policy;
pub mod schema;
pub mod service;

pub use loader::{BuiltinPlugin, DirectoryPlugin, TemplateDefinitions, TemplatePlugin};
pub use policy::{ConfigOverrideOption, KeyTransform, PropsOverrideOption};
pub use schema::{
    InputField, InputManifest, RunSpec, StepSource, StepTemplate, TemplateSelectedStep,
    WorkflowTemplate,
};
pub use service::{WorkflowTemplateRecord, WorkflowTemplateService};

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkflowError};

/// Lookup of immutable templates by `(id, version)`
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn find_step_template(&self, id: &str, v: u32) -> Result<Option<StepTemplate>>;

    async fn find_workflow_template(&self, id: &str, v: u32) -> Result<Option<WorkflowTemplate>>;

    async fn must_find_step_template(&self, id: &str, v: u32) -> Result<StepTemplate> {
        self.find_step_template(id, v)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("step template {id} v{v} not found")))
    }

    async fn must_find_workflow_template(&self, id: &str, v: u32) -> Result<WorkflowTemplate> {
        self.find_workflow_template(id, v).await?.ok_or_else(|| {
            WorkflowError::not_found(format!("workflow template {id} v{v} not found"))
        })
    }
}

type VersionKey = (String, u32);

/// In-memory registry of plugin-contributed templates
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    step_templates: BTreeMap<VersionKey, StepTemplate>,
    workflow_templates: BTreeMap<VersionKey, WorkflowTemplate>,
}

impl TemplateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every plugin.
    ///
    /// Step templates from all plugins are registered before any workflow
    /// template so that a workflow template may reference a step template
    /// contributed by a different plugin.
    pub fn bootstrap(plugins: &[Box<dyn TemplatePlugin>]) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        let mut workflow_templates = Vec::new();

        for plugin in plugins {
            let definitions = plugin
                .load()
                .with_context(|| format!("Failed to load template plugin '{}'", plugin.name()))?;
            debug!(
                "Plugin '{}' contributed {} step templates and {} workflow templates",
                plugin.name(),
                definitions.step_templates.len(),
                definitions.workflow_templates.len()
            );
            for step_template in definitions.step_templates {
                registry.register_step_template(step_template);
            }
            workflow_templates.extend(definitions.workflow_templates);
        }

        for workflow_template in workflow_templates {
            let id = workflow_template.id.clone();
            let v = workflow_template.v;
            if let Err(missing) = registry.register_workflow_template(workflow_template) {
                warn!(
                    "Skipping workflow template {} v{}: {}",
                    id,
                    v,
                    missing.join("; ")
                );
            }
        }

        info!(
            "Template registry loaded {} step templates and {} workflow templates",
            registry.step_templates.len(),
            registry.workflow_templates.len()
        );
        Ok(registry)
    }

    pub fn register_step_template(&mut self, step_template: StepTemplate) {
        let key = (step_template.id.clone(), step_template.v);
        if self.step_templates.contains_key(&key) {
            debug!("Step template {} v{} overridden", key.0, key.1);
        }
        self.step_templates.insert(key, step_template);
    }

    /// Register a workflow template, embedding its step templates.
    ///
    /// Fails with the unresolved references if any step template is unknown.
    pub fn register_workflow_template(
        &mut self,
        workflow_template: WorkflowTemplate,
    ) -> std::result::Result<(), Vec<String>> {
        let hydrated = workflow_template.hydrated(|id, v| self.step_template(id, v).cloned())?;
        let key = (hydrated.id.clone(), hydrated.v);
        if self.workflow_templates.contains_key(&key) {
            debug!("Workflow template {} v{} overridden", key.0, key.1);
        }
        self.workflow_templates.insert(key, hydrated);
        Ok(())
    }

    pub fn step_template(&self, id: &str, v: u32) -> Option<&StepTemplate> {
        self.step_templates.get(&(id.to_string(), v))
    }

    pub fn workflow_template(&self, id: &str, v: u32) -> Option<&WorkflowTemplate> {
        self.workflow_templates.get(&(id.to_string(), v))
    }

    /// All step templates, ordered by id then version
    pub fn step_templates(&self) -> impl Iterator<Item = &StepTemplate> {
        self.step_templates.values()
    }

    /// All workflow templates, ordered by id then version
    pub fn workflow_templates(&self) -> impl Iterator<Item = &WorkflowTemplate> {
        self.workflow_templates.values()
    }

    /// Versions registered for a step template id, ascending
    pub fn step_template_versions(&self, id: &str) -> Vec<&StepTemplate> {
        self.step_templates
            .values()
            .filter(|t| t.id == id)
            .collect()
    }

    /// Highest registered version of a workflow template
    pub fn latest_workflow_template(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.workflow_templates.values().rev().find(|t| t.id == id)
    }

    /// Whether any plugin contributed a workflow template with this id
    pub fn owns_workflow_template_id(&self, id: &str) -> bool {
        self.workflow_templates.keys().any(|(key, _)| key == id)
    }
}

#[async_trait]
impl TemplateCatalog for TemplateRegistry {
    async fn find_step_template(&self, id: &str, v: u32) -> Result<Option<StepTemplate>> {
        Ok(self.step_template(id, v).cloned())
    }

    async fn find_workflow_template(&self, id: &str, v: u32) -> Result<Option<WorkflowTemplate>> {
        Ok(self.workflow_template(id, v).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticPlugin(TemplateDefinitions);

    impl TemplatePlugin for StaticPlugin {
        fn name(&self) -> &str {
            "static"
        }

        fn load(&self) -> anyhow::Result<TemplateDefinitions> {
            Ok(self.0.clone())
        }
    }

    fn step(id: &str) -> StepTemplate {
        serde_json::from_value(json!({
            "id": id,
            "v": 1,
            "title": id,
            "src": {"plugin": "test", "name": id}
        }))
        .unwrap()
    }

    fn workflow_template(id: &str, step_template_id: &str) -> WorkflowTemplate {
        serde_json::from_value(json!({
            "id": id,
            "v": 1,
            "title": id,
            "selectedSteps": [
                {"id": "s1", "stepTemplateId": step_template_id, "stepTemplateVer": 1}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_builtin_bootstrap_hydrates_templates() {
        let plugins: Vec<Box<dyn TemplatePlugin>> = vec![Box::new(BuiltinPlugin)];
        let registry = TemplateRegistry::bootstrap(&plugins).unwrap();

        let template = registry.workflow_template("wt-provision-fleet", 1).unwrap();
        assert!(template.is_hydrated());
        assert!(registry.owns_workflow_template_id("wt-empty"));
        assert!(!registry.owns_workflow_template_id("wf-1"));
        assert_eq!(
            registry.latest_workflow_template("wt-empty").map(|t| t.v),
            Some(1)
        );
    }

    #[test]
    fn test_bootstrap_resolves_across_plugins() {
        let plugins: Vec<Box<dyn TemplatePlugin>> = vec![
            Box::new(StaticPlugin(TemplateDefinitions {
                step_templates: vec![],
                workflow_templates: vec![workflow_template("wt-cross", "st-late")],
            })),
            Box::new(StaticPlugin(TemplateDefinitions {
                step_templates: vec![step("st-late")],
                workflow_templates: vec![],
            })),
        ];
        let registry = TemplateRegistry::bootstrap(&plugins).unwrap();
        assert!(registry.workflow_template("wt-cross", 1).is_some());
    }

    #[test]
    fn test_bootstrap_skips_unknown_step_references() {
        let plugins: Vec<Box<dyn TemplatePlugin>> = vec![Box::new(StaticPlugin(
            TemplateDefinitions {
                step_templates: vec![step("st-a")],
                workflow_templates: vec![
                    workflow_template("wt-good", "st-a"),
                    workflow_template("wt-bad", "st-missing"),
                ],
            },
        ))];
        let registry = TemplateRegistry::bootstrap(&plugins).unwrap();
        assert!(registry.workflow_template("wt-good", 1).is_some());
        assert!(registry.workflow_template("wt-bad", 1).is_none());
        assert_eq!(registry.workflow_templates().count(), 1);
    }

    #[tokio::test]
    async fn test_catalog_must_find_reports_not_found() {
        let registry = TemplateRegistry::new();
        let err = registry
            .must_find_step_template("st-none", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
        assert!(err.to_string().contains("st-none"));
    }
}
