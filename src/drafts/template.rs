//! Workflow template draft lifecycle

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{apply_patch, Draft, DraftStore};
use crate::error::{Result, WorkflowError};
use crate::services::{Guards, RequestContext, SchemaId};
use crate::store::Store;
use crate::templates::{
    PropsOverrideOption, RunSpec, WorkflowTemplate, WorkflowTemplateRecord,
    WorkflowTemplateService,
};
use crate::templates::schema::INDEFINITE_TTL;
use crate::workflows::DEFAULT_VERSION;

pub type WorkflowTemplateDraft = Draft<WorkflowTemplate>;

/// Body of a "start editing" request for a workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowTemplateDraftRequest {
    pub template_id: String,
    #[serde(default)]
    pub is_new: bool,
    /// Version to seed from; latest when absent
    #[serde(default)]
    pub v: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

#[derive(Clone)]
pub struct WorkflowTemplateDraftService {
    drafts: DraftStore<WorkflowTemplate>,
    templates: WorkflowTemplateService,
    guards: Guards,
}

impl WorkflowTemplateDraftService {
    pub fn new(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        templates: WorkflowTemplateService,
        guards: Guards,
    ) -> Self {
        Self {
            drafts: DraftStore::new(store, table, "workflow template"),
            templates,
            guards,
        }
    }

    pub async fn create_draft(
        &self,
        ctx: &RequestContext,
        payload: Value,
    ) -> Result<WorkflowTemplateDraft> {
        self.guards
            .authorize(ctx, "create-workflow-template-draft")?;
        self.guards
            .validate(SchemaId::CreateWorkflowTemplateDraft, &payload)?;
        let request: CreateWorkflowTemplateDraftRequest = serde_json::from_value(payload)
            .map_err(|e| WorkflowError::validation(e.to_string()))?;

        if self
            .templates
            .registry()
            .owns_workflow_template_id(&request.template_id)
        {
            return Err(WorkflowError::conflict(format!(
                "workflow template {} is provided by a plugin and cannot be edited",
                request.template_id
            )));
        }

        let draft = if request.is_new {
            if self.templates.exists(&request.template_id).await? {
                return Err(WorkflowError::conflict(format!(
                    "workflow template {} already exists",
                    request.template_id
                )));
            }
            let Some(title) = request.title.clone() else {
                return Err(WorkflowError::validation(
                    "title is required for a new workflow template",
                ));
            };
            let template = WorkflowTemplate {
                id: request.template_id.clone(),
                v: DEFAULT_VERSION,
                title,
                desc: request.desc.clone().unwrap_or_default(),
                instance_ttl: INDEFINITE_TTL,
                builtin: false,
                hidden: false,
                run_spec: RunSpec::default(),
                selected_steps: Vec::new(),
                props_override_option: PropsOverrideOption::default(),
            };
            Draft::new(ctx.uid(), &request.template_id, true, None, template)
        } else {
            let record = match request.v {
                Some(v) => {
                    self.templates
                        .must_find_version(&request.template_id, v)
                        .await?
                }
                None => self.templates.must_find_latest(&request.template_id).await?,
            };
            Draft::new(
                ctx.uid(),
                &request.template_id,
                false,
                Some(record.v),
                record.data,
            )
        };

        self.drafts.create(&draft).await?;
        info!("Created workflow template draft {}", draft.id);
        self.guards
            .audit(ctx, "create-workflow-template-draft", &draft)
            .await;
        Ok(draft)
    }

    pub async fn update_draft(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        payload: Value,
    ) -> Result<WorkflowTemplateDraft> {
        self.guards
            .authorize(ctx, "update-workflow-template-draft")?;
        self.guards
            .validate(SchemaId::UpdateWorkflowTemplateDraft, &payload)?;
        let draft = self.apply_update(ctx, draft_id, &payload).await?;
        self.guards
            .audit(ctx, "update-workflow-template-draft", &draft)
            .await;
        Ok(draft)
    }

    async fn apply_update(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        patch: &Value,
    ) -> Result<WorkflowTemplateDraft> {
        let mut draft = self.drafts.must_find(ctx.uid(), draft_id).await?;
        let mut template = apply_patch(&draft.data, patch)?;
        // Steps are re-embedded from the registry on publish
        if patch.get("selectedSteps").is_some() {
            for step in &mut template.selected_steps {
                step.step_template = None;
            }
        }
        draft.data = template;
        draft.updated_at = Utc::now();
        self.drafts.save(&draft).await?;
        Ok(draft)
    }

    pub async fn publish_draft(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
        payload: Value,
    ) -> Result<WorkflowTemplateRecord> {
        self.guards
            .authorize(ctx, "publish-workflow-template-draft")?;
        self.guards
            .validate(SchemaId::PublishWorkflowTemplateDraft, &payload)?;
        let draft = self.apply_update(ctx, draft_id, &payload).await?;

        let mut template = draft.data.clone();
        let record = if draft.is_new {
            template.v = DEFAULT_VERSION;
            self.templates.create(ctx, template).await?
        } else {
            let latest = self.templates.must_find_latest(&draft.target_id).await?;
            let current = self
                .templates
                .must_find_version(&draft.target_id, latest.v)
                .await?;
            template.v = current.v;
            self.templates.update(ctx, template, current.rev).await?
        };

        if let Err(e) = self.drafts.delete(ctx.uid(), &draft.id).await {
            warn!(
                "Published workflow template draft {} but could not delete it: {}",
                draft.id, e
            );
        }
        info!(
            "Published workflow template draft {} as {} v{}",
            draft.id, record.id, record.v
        );
        self.guards
            .audit(
                ctx,
                "publish-workflow-template-draft",
                &json!({"draftId": draft.id, "id": record.id, "v": record.v, "rev": record.rev}),
            )
            .await;
        Ok(record)
    }

    pub async fn delete_draft(&self, ctx: &RequestContext, draft_id: &str) -> Result<()> {
        self.guards
            .authorize(ctx, "delete-workflow-template-draft")?;
        self.drafts.delete(ctx.uid(), draft_id).await?;
        self.guards
            .audit(
                ctx,
                "delete-workflow-template-draft",
                &json!({"draftId": draft_id}),
            )
            .await;
        Ok(())
    }

    pub async fn find_draft(
        &self,
        ctx: &RequestContext,
        draft_id: &str,
    ) -> Result<WorkflowTemplateDraft> {
        self.drafts.must_find(ctx.uid(), draft_id).await
    }

    pub async fn list_my_drafts(&self, ctx: &RequestContext) -> Result<Vec<WorkflowTemplateDraft>> {
        self.drafts.list(ctx.uid()).await
    }
}
