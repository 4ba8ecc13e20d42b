//! Data Transfer Objects for the REST API.
//!
//! Full entities (templates, workflow records, drafts) are returned as their
//! serde representation; these types cover health, listings and queries.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::templates::{StepTemplate, WorkflowTemplate};
use crate::workflows::WorkflowRecord;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Status response with catalog counts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub step_template_count: usize,
    pub workflow_template_count: usize,
}

/// Summary of a step template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepTemplateSummary {
    pub id: String,
    pub v: u32,
    pub title: String,
    pub desc: String,
    pub skippable: bool,
    pub plugin: String,
}

impl From<&StepTemplate> for StepTemplateSummary {
    fn from(st: &StepTemplate) -> Self {
        Self {
            id: st.id.clone(),
            v: st.v,
            title: st.title.clone(),
            desc: st.desc.clone(),
            skippable: st.skippable,
            plugin: st.src.plugin.clone(),
        }
    }
}

/// Summary of a workflow template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplateSummary {
    pub id: String,
    pub v: u32,
    pub title: String,
    pub desc: String,
    pub builtin: bool,
    pub hidden: bool,
    pub step_count: usize,
}

impl From<&WorkflowTemplate> for WorkflowTemplateSummary {
    fn from(wt: &WorkflowTemplate) -> Self {
        Self {
            id: wt.id.clone(),
            v: wt.v,
            title: wt.title.clone(),
            desc: wt.desc.clone(),
            builtin: wt.builtin,
            hidden: wt.hidden,
            step_count: wt.selected_steps.len(),
        }
    }
}

/// Summary of the latest version of a workflow
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    pub v: u32,
    pub rev: u64,
    pub title: String,
    pub workflow_template_id: String,
    pub workflow_template_ver: u32,
    pub updated_by: String,
    pub updated_at: String,
}

impl From<&WorkflowRecord> for WorkflowSummary {
    fn from(record: &WorkflowRecord) -> Self {
        Self {
            id: record.id.clone(),
            v: record.v,
            rev: record.rev,
            title: record.data.title.clone(),
            workflow_template_id: record.data.workflow_template_id.clone(),
            workflow_template_ver: record.data.workflow_template_ver,
            updated_by: record.updated_by.clone(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Result of deleting a workflow
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorkflowResponse {
    pub id: String,
    pub deleted_versions: usize,
}

/// Filter for listing workflow templates
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TemplateListQuery {
    /// Include templates marked hidden
    #[serde(default)]
    pub include_hidden: bool,
}

/// Optional version selector
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VersionQuery {
    /// Specific version; latest when absent
    pub v: Option<u32>,
}
