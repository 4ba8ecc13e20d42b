//! Workflow definition operations

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::constraints::check_overrides;
use super::defaults::merge_defaults;
use super::resolver::resolve_steps;
use super::schema::{EffectiveWorkflow, Workflow};
use crate::error::{Result, WorkflowError};
use crate::services::{Guards, RequestContext, SchemaId};
use crate::store::Store;
use crate::templates::TemplateCatalog;
use crate::versions::{VersionRecord, VersionedWriter};

/// Version assigned when a create request does not name one
pub const DEFAULT_VERSION: u32 = 1;

pub type WorkflowRecord = VersionRecord<EffectiveWorkflow>;

/// Versioned workflows derived from workflow templates
#[derive(Clone)]
pub struct WorkflowService {
    writer: VersionedWriter<EffectiveWorkflow>,
    catalog: Arc<dyn TemplateCatalog>,
    guards: Guards,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        catalog: Arc<dyn TemplateCatalog>,
        guards: Guards,
    ) -> Self {
        Self {
            writer: VersionedWriter::new(store, table, "workflow"),
            catalog,
            guards,
        }
    }

    /// Resolve, merge and check a manifest without writing anything
    pub async fn prepare(&self, workflow: &Workflow) -> Result<EffectiveWorkflow> {
        let template = self
            .catalog
            .must_find_workflow_template(&workflow.workflow_template_id, workflow.workflow_template_ver)
            .await?;
        let resolved = resolve_steps(workflow, &template, self.catalog.as_ref()).await?;
        let effective = merge_defaults(workflow, &template, &resolved);
        check_overrides(&effective, &template, &resolved)?;
        Ok(effective)
    }

    /// Validate a raw create payload and create the version it describes
    pub async fn create_version(&self, ctx: &RequestContext, payload: Value) -> Result<WorkflowRecord> {
        self.guards.authorize(ctx, "create-workflow")?;
        self.guards.validate(SchemaId::CreateWorkflow, &payload)?;
        let workflow = parse_manifest(payload)?;
        self.write_new(ctx, workflow).await
    }

    /// Create a version from an already validated manifest
    pub async fn create(&self, ctx: &RequestContext, workflow: Workflow) -> Result<WorkflowRecord> {
        self.guards.authorize(ctx, "create-workflow")?;
        self.write_new(ctx, workflow).await
    }

    async fn write_new(&self, ctx: &RequestContext, workflow: Workflow) -> Result<WorkflowRecord> {
        let v = workflow.v.unwrap_or(DEFAULT_VERSION);
        let effective = self.prepare(&workflow).await?;

        let record = self
            .writer
            .create_version(&workflow.id, v, effective, ctx.uid())
            .await?;
        self.guards.audit(ctx, "create-workflow", &record).await;
        Ok(record)
    }

    /// Validate a raw update payload and replace the version it names
    pub async fn update_version(&self, ctx: &RequestContext, payload: Value) -> Result<WorkflowRecord> {
        self.guards.authorize(ctx, "update-workflow")?;
        self.guards.validate(SchemaId::UpdateWorkflow, &payload)?;
        let workflow = parse_manifest(payload)?;
        self.write_update(ctx, workflow).await
    }

    /// Replace a version from an already validated manifest carrying `v` and `rev`
    pub async fn update(&self, ctx: &RequestContext, workflow: Workflow) -> Result<WorkflowRecord> {
        self.guards.authorize(ctx, "update-workflow")?;
        self.write_update(ctx, workflow).await
    }

    async fn write_update(&self, ctx: &RequestContext, workflow: Workflow) -> Result<WorkflowRecord> {
        let (Some(v), Some(rev)) = (workflow.v, workflow.rev) else {
            return Err(WorkflowError::validation(
                "v and rev are required to update a workflow",
            ));
        };
        let effective = self.prepare(&workflow).await?;

        let record = self
            .writer
            .update_version(&workflow.id, v, rev, effective, ctx.uid())
            .await?;
        self.guards.audit(ctx, "update-workflow", &record).await;
        Ok(record)
    }

    pub async fn find_version(&self, id: &str, v: u32) -> Result<Option<WorkflowRecord>> {
        self.writer.find_version(id, v).await
    }

    pub async fn must_find_version(&self, id: &str, v: u32) -> Result<WorkflowRecord> {
        self.writer.must_find_version(id, v).await
    }

    pub async fn find_latest(&self, id: &str) -> Result<Option<WorkflowRecord>> {
        self.writer.find_latest(id).await
    }

    pub async fn must_find_latest(&self, id: &str) -> Result<WorkflowRecord> {
        self.writer.must_find_latest(id).await
    }

    /// Latest version of every workflow
    pub async fn list_latest(&self) -> Result<Vec<WorkflowRecord>> {
        self.writer.list_latest().await
    }

    pub async fn list_versions(&self, id: &str) -> Result<Vec<WorkflowRecord>> {
        self.writer.list_versions(id).await
    }

    /// Whether any version of `id` exists
    pub async fn exists(&self, id: &str) -> Result<bool> {
        if self.find_latest(id).await?.is_some() {
            return Ok(true);
        }
        Ok(!self.list_versions(id).await?.is_empty())
    }

    /// Delete every version of a workflow
    pub async fn delete_workflow(&self, ctx: &RequestContext, id: &str) -> Result<usize> {
        self.guards.authorize(ctx, "delete-workflow")?;
        let deleted = self.writer.delete_all_versions(id).await?;
        if deleted == 0 {
            return Err(WorkflowError::not_found(format!("workflow {} not found", id)));
        }
        info!("Deleted workflow {} ({} versions)", id, deleted);
        self.guards
            .audit(ctx, "delete-workflow", &serde_json::json!({"id": id, "versions": deleted}))
            .await;
        Ok(deleted)
    }
}

fn parse_manifest(payload: Value) -> Result<Workflow> {
    serde_json::from_value(payload).map_err(|e| WorkflowError::validation(e.to_string()))
}
