//! Admin-authored workflow templates, stored as versions

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::schema::{StepTemplate, WorkflowTemplate};
use super::{TemplateCatalog, TemplateRegistry};
use crate::error::{Result, WorkflowError};
use crate::services::{Guards, RequestContext, SchemaId};
use crate::store::Store;
use crate::versions::{VersionRecord, VersionedWriter};
use crate::workflows::resolver::ensure_unique_step_ids;
use crate::workflows::DEFAULT_VERSION;

pub type WorkflowTemplateRecord = VersionRecord<WorkflowTemplate>;

/// Workflow templates authored at runtime, layered over the plugin registry
#[derive(Clone)]
pub struct WorkflowTemplateService {
    writer: VersionedWriter<WorkflowTemplate>,
    registry: Arc<TemplateRegistry>,
    guards: Guards,
}

impl WorkflowTemplateService {
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        registry: Arc<TemplateRegistry>,
        guards: Guards,
    ) -> Self {
        Self {
            writer: VersionedWriter::new(store, table, "workflow template"),
            registry,
            guards,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Validate a raw create payload and store the template it describes
    pub async fn create_version(
        &self,
        ctx: &RequestContext,
        payload: Value,
    ) -> Result<WorkflowTemplateRecord> {
        self.guards.authorize(ctx, "create-workflow-template")?;
        self.guards
            .validate(SchemaId::CreateWorkflowTemplate, &payload)?;
        let template = parse_template(payload)?;
        self.write_new(ctx, template).await
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplateRecord> {
        self.guards.authorize(ctx, "create-workflow-template")?;
        self.write_new(ctx, template).await
    }

    async fn write_new(
        &self,
        ctx: &RequestContext,
        template: WorkflowTemplate,
    ) -> Result<WorkflowTemplateRecord> {
        let template = self.prepare(template)?;
        let record = self
            .writer
            .create_version(&template.id.clone(), template.v, template, ctx.uid())
            .await?;
        self.guards
            .audit(ctx, "create-workflow-template", &record)
            .await;
        Ok(record)
    }

    /// Validate a raw update payload and replace the version it names
    pub async fn update_version(
        &self,
        ctx: &RequestContext,
        payload: Value,
    ) -> Result<WorkflowTemplateRecord> {
        self.guards.authorize(ctx, "update-workflow-template")?;
        self.guards
            .validate(SchemaId::UpdateWorkflowTemplate, &payload)?;
        let rev = payload
            .get("rev")
            .and_then(Value::as_u64)
            .ok_or_else(|| WorkflowError::validation("rev is required"))?;
        let template = parse_template(payload)?;
        self.write_update(ctx, template, rev).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        template: WorkflowTemplate,
        rev: u64,
    ) -> Result<WorkflowTemplateRecord> {
        self.guards.authorize(ctx, "update-workflow-template")?;
        self.write_update(ctx, template, rev).await
    }

    async fn write_update(
        &self,
        ctx: &RequestContext,
        template: WorkflowTemplate,
        rev: u64,
    ) -> Result<WorkflowTemplateRecord> {
        let template = self.prepare(template)?;
        let record = self
            .writer
            .update_version(&template.id.clone(), template.v, rev, template, ctx.uid())
            .await?;
        self.guards
            .audit(ctx, "update-workflow-template", &record)
            .await;
        Ok(record)
    }

    /// Check ownership and step ids, then embed registry step templates
    fn prepare(&self, mut template: WorkflowTemplate) -> Result<WorkflowTemplate> {
        if self.registry.owns_workflow_template_id(&template.id) {
            return Err(WorkflowError::conflict(format!(
                "workflow template {} is provided by a plugin and cannot be changed",
                template.id
            )));
        }
        ensure_unique_step_ids(template.selected_steps.iter().map(|s| s.id.as_str()))?;

        template.builtin = false;
        for step in &mut template.selected_steps {
            step.step_template = None;
        }
        template
            .hydrated(|id, v| self.registry.step_template(id, v).cloned())
            .map_err(|missing| WorkflowError::NotFound(missing.join("; ")))
    }

    pub async fn find_version(&self, id: &str, v: u32) -> Result<Option<WorkflowTemplateRecord>> {
        self.writer.find_version(id, v).await
    }

    pub async fn must_find_version(&self, id: &str, v: u32) -> Result<WorkflowTemplateRecord> {
        self.writer.must_find_version(id, v).await
    }

    pub async fn find_latest(&self, id: &str) -> Result<Option<WorkflowTemplateRecord>> {
        self.writer.find_latest(id).await
    }

    pub async fn must_find_latest(&self, id: &str) -> Result<WorkflowTemplateRecord> {
        self.writer.must_find_latest(id).await
    }

    pub async fn list_versions(&self, id: &str) -> Result<Vec<WorkflowTemplateRecord>> {
        self.writer.list_versions(id).await
    }

    /// Latest stored version of every admin-authored template
    pub async fn list_latest(&self) -> Result<Vec<WorkflowTemplateRecord>> {
        self.writer.list_latest().await
    }

    /// Plugin templates followed by the latest stored templates
    pub async fn list_all(&self, include_hidden: bool) -> Result<Vec<WorkflowTemplate>> {
        let stored = self.list_latest().await?;
        Ok(self
            .registry
            .workflow_templates()
            .cloned()
            .chain(stored.into_iter().map(|record| record.data))
            .filter(|t| include_hidden || !t.hidden)
            .collect())
    }

    /// Current definition of a template: the highest plugin version, or the
    /// latest stored version for admin-authored ids
    pub async fn must_find_current(&self, id: &str) -> Result<WorkflowTemplate> {
        if let Some(template) = self.registry.latest_workflow_template(id) {
            return Ok(template.clone());
        }
        Ok(self.must_find_latest(id).await?.data)
    }

    /// Whether `id` names a plugin template or any stored version
    pub async fn exists(&self, id: &str) -> Result<bool> {
        if self.registry.owns_workflow_template_id(id) {
            return Ok(true);
        }
        Ok(!self.list_versions(id).await?.is_empty())
    }
}

#[async_trait]
impl TemplateCatalog for WorkflowTemplateService {
    async fn find_step_template(&self, id: &str, v: u32) -> Result<Option<StepTemplate>> {
        Ok(self.registry.step_template(id, v).cloned())
    }

    async fn find_workflow_template(&self, id: &str, v: u32) -> Result<Option<WorkflowTemplate>> {
        if let Some(template) = self.registry.workflow_template(id, v) {
            return Ok(Some(template.clone()));
        }
        Ok(self.writer.find_version(id, v).await?.map(|record| record.data))
    }
}

/// Deserialize a template payload, defaulting `v` to the first version
fn parse_template(mut payload: Value) -> Result<WorkflowTemplate> {
    if let Some(object) = payload.as_object_mut() {
        object
            .entry("v")
            .or_insert_with(|| Value::from(DEFAULT_VERSION));
    }
    serde_json::from_value(payload).map_err(|e| WorkflowError::validation(e.to_string()))
}
