//! Workflow manifests and their effective (defaults-applied) form

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::templates::{
    ConfigOverrideOption, PropsOverrideOption, RunSpec, StepSource, TemplateSelectedStep,
};

/// A step as submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedStep {
    pub id: String,
    pub step_template_id: String,
    pub step_template_ver: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
    #[serde(default)]
    pub configs: Map<String, Value>,
    /// Caller fields carried through to the effective step unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SelectedStep {
    /// Seed a step from a template entry, taking its default configs
    pub fn from_template_step(step: &TemplateSelectedStep) -> Self {
        Self {
            id: step.id.clone(),
            step_template_id: step.step_template_id.clone(),
            step_template_ver: step.step_template_ver,
            title: None,
            desc: None,
            skippable: None,
            configs: step.configs.clone(),
            extra: Map::new(),
        }
    }
}

/// Workflow manifest: what the caller submits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u32>,
    /// Required on update; the rev the caller last read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
    pub workflow_template_id: String,
    pub workflow_template_ver: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_spec: Option<RunSpec>,
    #[serde(default)]
    pub selected_steps: Vec<SelectedStep>,
}

/// A step with every default applied and its override policies attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStep {
    pub id: String,
    pub step_template_id: String,
    pub step_template_ver: u32,
    pub title: String,
    pub desc: String,
    pub skippable: bool,
    pub src: StepSource,
    pub configs: Map<String, Value>,
    pub props_override_option: PropsOverrideOption,
    pub config_override_option: ConfigOverrideOption,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The stored form of a workflow version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveWorkflow {
    pub id: String,
    pub workflow_template_id: String,
    pub workflow_template_ver: u32,
    pub title: String,
    pub desc: String,
    pub instance_ttl: i64,
    pub builtin: bool,
    pub hidden: bool,
    pub run_spec: RunSpec,
    pub selected_steps: Vec<EffectiveStep>,
}

impl EffectiveWorkflow {
    pub fn get_step(&self, id: &str) -> Option<&EffectiveStep> {
        self.selected_steps.iter().find(|s| s.id == id)
    }
}

impl From<&EffectiveStep> for SelectedStep {
    fn from(step: &EffectiveStep) -> Self {
        Self {
            id: step.id.clone(),
            step_template_id: step.step_template_id.clone(),
            step_template_ver: step.step_template_ver,
            title: Some(step.title.clone()),
            desc: Some(step.desc.clone()),
            skippable: Some(step.skippable),
            configs: step.configs.clone(),
            extra: step.extra.clone(),
        }
    }
}

/// Turn a stored workflow back into a manifest with every value explicit
impl From<&EffectiveWorkflow> for Workflow {
    fn from(workflow: &EffectiveWorkflow) -> Self {
        Self {
            id: workflow.id.clone(),
            v: None,
            rev: None,
            workflow_template_id: workflow.workflow_template_id.clone(),
            workflow_template_ver: workflow.workflow_template_ver,
            title: Some(workflow.title.clone()),
            desc: Some(workflow.desc.clone()),
            instance_ttl: Some(workflow.instance_ttl),
            builtin: Some(workflow.builtin),
            hidden: Some(workflow.hidden),
            run_spec: Some(workflow.run_spec.clone()),
            selected_steps: workflow.selected_steps.iter().map(SelectedStep::from).collect(),
        }
    }
}
