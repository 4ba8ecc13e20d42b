//! Workflow draft lifecycle

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{apply_patch, Draft, DraftStore};
use crate::error::{Result, WorkflowError};
use crate::services::{Guards, RequestContext, SchemaId};
use crate::store::Store;
use crate::templates::{TemplateCatalog, WorkflowTemplate};
use crate::workflows::{SelectedStep, Workflow, WorkflowRecord, WorkflowService};

pub type WorkflowDraft = Draft<Workflow>;

/// Body of a "start editing" request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowDraftRequest {
    pub workflow_id: String,
    #[serde(default)]
    pub is_new: bool,
    /// Version to seed from; latest when absent
    #[serde(default)]
    pub v: Option<u32>,
    #[serde(default)]
    pub workflow_template_id: Option<String>,
    #[serde(default)]
    pub workflow_template_ver: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

fn seed_steps(template: &WorkflowTemplate) -> Vec<SelectedStep> {
    template
        .selected_steps
        .iter()
        .map(SelectedStep::from_template_step)
        .collect()
}

#[derive(Clone)]
pub struct WorkflowDraftService {
    drafts: DraftStore<Workflow>,
    workflows: WorkflowService,
    catalog: Arc<dyn TemplateCatalog>,
    guards: Guards,
}

impl WorkflowDraftService {
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        workflows: WorkflowService,
        catalog: Arc<dyn TemplateCatalog>,
        guards: Guards,
    ) -> Self {
        Self {
            drafts: DraftStore::new(store, table, "workflow"),
            workflows,
            catalog,
            guards,
        }
    }

    /// Start editing a new or existing workflow
    pub async fn create_draft(&self, ctx: &RequestContext, payload: Value) -> Result<WorkflowDraft> {
        self.guards.authorize(ctx, "create-workflow-draft")?;
        self.guards
            .validate(SchemaId::CreateWorkflowDraft, &payload)?;
        let request: CreateWorkflowDraftRequest = serde_json::from_value(payload)
            .map_err(|e| WorkflowError::validation(e.to_string()))?;

        let draft = if request.is_new {
            self.seed_new(ctx, &request).await?
        } else {
            self.seed_existing(ctx, &request).await?
        };

        self.drafts.create(&draft).await?;
        info!("Created workflow draft {}", draft.id);
        self.guards
            .audit(ctx, "create-workflow-draft", &draft)
            .await;
        Ok(draft)
    }

    async fn seed_new(
        &self,
        ctx: &RequestContext,
        request: &CreateWorkflowDraftRequest,
    ) -> Result<WorkflowDraft> {
        if self.workflows.exists(&request.workflow_id).await? {
            return Err(WorkflowError::conflict(format!(
                "workflow {} already exists",
                request.workflow_id
            )));
        }
        let (Some(template_id), Some(template_ver)) = (
            request.workflow_template_id.as_deref(),
            request.workflow_template_ver,
        ) else {
            return Err(WorkflowError::validation(
                "workflowTemplateId and workflowTemplateVer are required for a new workflow",
            ));
        };
        let template = self
            .catalog
            .must_find_workflow_template(template_id, template_ver)
            .await?;

        let workflow = Workflow {
            id: request.workflow_id.clone(),
            v: None,
            rev: None,
            workflow_template_id: template.id.clone(),
            workflow_template_ver: template.v,
            title: request.title.clone(),
            desc: request.desc.clone(),
            instance_ttl: None,
            builtin: None,
            hidden: None,
            run_spec: None,
            selected_steps: seed_steps(&template),
        };
        Ok(Draft::new(ctx.uid(), &request.workflow_id, true, None, workflow))
    }

    async fn seed_existing(
        &self,
        ctx: &RequestContext,
        request: &CreateWorkflowDraftRequest,
    ) -> Result<WorkflowDraft> {
        let record = match request.v {
            Some(v) => {
                self.workflows
                    .must_find_version(&request.workflow_id, v)
                    .await?
            }
            None => self.workflows.must_find_latest(&request.workflow_id).await?,
        };

        let mut workflow = Workflow::from(&record.data);
        workflow.v = Some(record.v);
        workflow.rev = Some(record.rev);
        Ok(Draft::new(
            ctx.uid(),
            &request.workflow_id,
            false,
            Some(record.v),
            workflow,
        ))
    }

    /// Merge a partial workflow into the caller's draft
    pub async fn update_draft(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        payload: Value,
    ) -> Result<WorkflowDraft> {
        self.guards.authorize(ctx, "update-workflow-draft")?;
        self.guards
            .validate(SchemaId::UpdateWorkflowDraft, &payload)?;
        let draft = self.apply_update(ctx, draft_id, &payload).await?;
        self.guards
            .audit(ctx, "update-workflow-draft", &draft)
            .await;
        Ok(draft)
    }

    async fn apply_update(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        patch: &Value,
    ) -> Result<WorkflowDraft> {
        let mut draft = self.drafts.must_find(ctx.uid(), draft_id).await?;
        let mut workflow = apply_patch(&draft.data, patch)?;

        let template_changed = workflow.workflow_template_id != draft.data.workflow_template_id
            || workflow.workflow_template_ver != draft.data.workflow_template_ver;
        if template_changed && patch.get("selectedSteps").is_none() {
            let template = self
                .catalog
                .must_find_workflow_template(
                    &workflow.workflow_template_id,
                    workflow.workflow_template_ver,
                )
                .await?;
            workflow.selected_steps = seed_steps(&template);
        }

        draft.data = workflow;
        draft.updated_at = Utc::now();
        self.drafts.save(&draft).await?;
        Ok(draft)
    }

    /// Flush `payload` into the draft, write it as a version, then drop the draft.
    ///
    /// On any failure before the version is written the draft is left as saved.
    pub async fn publish_draft(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        payload: Value,
    ) -> Result<WorkflowRecord> {
        self.guards.authorize(ctx, "publish-workflow-draft")?;
        self.guards
            .validate(SchemaId::PublishWorkflowDraft, &payload)?;
        let draft = self.apply_update(ctx, draft_id, &payload).await?;

        let mut workflow = draft.data.clone();
        let record = if draft.is_new {
            workflow.v = None;
            workflow.rev = None;
            self.workflows.create(ctx, workflow).await?
        } else {
            // The pointer picks the version; its copy may lag on rev
            let latest = self.workflows.must_find_latest(&draft.target_id).await?;
            let current = self
                .workflows
                .must_find_version(&draft.target_id, latest.v)
                .await?;
            workflow.v = Some(current.v);
            workflow.rev = Some(current.rev);
            self.workflows.update(ctx, workflow).await?
        };

        if let Err(e) = self.drafts.delete(ctx.uid(), &draft.id).await {
            warn!("Published workflow draft {} but could not delete it: {}", draft.id, e);
        }
        info!(
            "Published workflow draft {} as {} v{}",
            draft.id, record.id, record.v
        );
        self.guards
            .audit(
                ctx,
                "publish-workflow-draft",
                &json!({"draftId": draft.id, "id": record.id, "v": record.v, "rev": record.rev}),
            )
            .await;
        Ok(record)
    }

    pub async fn delete_draft(&self, ctx: &RequestContext, draft_id: &str) -> Result<()> {
        self.guards.authorize(ctx, "delete-workflow-draft")?;
        self.drafts.delete(ctx.uid(), draft_id).await?;
        self.guards
            .audit(ctx, "delete-workflow-draft", &json!({"draftId": draft_id}))
            .await;
        Ok(())
    }

    pub async fn find_draft(&self, ctx: &RequestContext, draft_id: &str) -> Result<WorkflowDraft> {
        self.drafts.must_find(ctx.uid(), draft_id).await
    }

    pub async fn list_my_drafts(&self, ctx: &RequestContext) -> Result<Vec<WorkflowDraft>> {
        self.drafts.list(ctx.uid()).await
    }
}
