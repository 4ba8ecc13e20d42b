//! Schema definitions for step templates and workflow templates

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::policy::{ConfigOverrideOption, PropsOverrideOption};

/// Instance TTL meaning "keep instances forever"
pub const INDEFINITE_TTL: i64 = -1;

fn indefinite_ttl() -> i64 {
    INDEFINITE_TTL
}

/// Execution source of a step: which plugin implements it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSource {
    /// Plugin that contributed the step implementation
    pub plugin: String,
    /// Step implementation name within the plugin
    pub name: String,
}

/// A configuration field (or section of fields) declared by a step template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    /// Configuration key; sections have no name
    #[serde(default)]
    pub name: Option<String>,
    /// UI widget type (e.g., stringInput, yesNoInput)
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Set internally by the step; never supplied by users
    #[serde(default)]
    pub non_interactive: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InputField>,
}

impl InputField {
    fn collect_interactive(&self, names: &mut BTreeSet<String>) {
        if let Some(name) = &self.name {
            if !self.non_interactive {
                names.insert(name.clone());
            }
        }
        for child in &self.children {
            child.collect_interactive(names);
        }
    }
}

/// Configuration fields a step template accepts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputManifest {
    #[serde(default)]
    pub sections: Vec<InputField>,
}

impl InputManifest {
    /// Names of every field a user may set, at any nesting depth
    pub fn interactive_field_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for section in &self.sections {
            section.collect_interactive(&mut names);
        }
        names
    }
}

/// Immutable definition of a single executable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTemplate {
    pub id: String,
    pub v: u32,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub skippable: bool,
    pub src: StepSource,
    #[serde(default)]
    pub input_manifest: InputManifest,
}

/// How workflow instances are run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    pub size: String,
    pub target: String,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            size: "small".to_string(),
            target: "stepFunctions".to_string(),
        }
    }
}

/// A step entry inside a workflow template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSelectedStep {
    pub id: String,
    pub step_template_id: String,
    pub step_template_ver: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
    /// Default configuration values
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub props_override_option: PropsOverrideOption,
    #[serde(default)]
    pub config_override_option: ConfigOverrideOption,
    /// Embedded copy of the referenced step template, filled in at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_template: Option<StepTemplate>,
}

impl TemplateSelectedStep {
    pub fn references(&self, step_template_id: &str, step_template_ver: u32) -> bool {
        self.step_template_id == step_template_id && self.step_template_ver == step_template_ver
    }
}

/// Immutable blueprint that workflows derive from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub v: u32,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Days a workflow instance is kept, `-1` for indefinitely
    #[serde(default = "indefinite_ttl")]
    pub instance_ttl: i64,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub run_spec: RunSpec,
    #[serde(default)]
    pub selected_steps: Vec<TemplateSelectedStep>,
    #[serde(default)]
    pub props_override_option: PropsOverrideOption,
}

impl WorkflowTemplate {
    /// Get a template step by id
    pub fn get_step(&self, id: &str) -> Option<&TemplateSelectedStep> {
        self.selected_steps.iter().find(|s| s.id == id)
    }

    /// Whether every step carries its step template
    pub fn is_hydrated(&self) -> bool {
        self.selected_steps.iter().all(|s| s.step_template.is_some())
    }

    /// Return a copy with every step's template embedded via `lookup`.
    ///
    /// Fails with the list of references `lookup` could not resolve.
    pub fn hydrated<F>(&self, mut lookup: F) -> Result<WorkflowTemplate, Vec<String>>
    where
        F: FnMut(&str, u32) -> Option<StepTemplate>,
    {
        let mut template = self.clone();
        let mut missing = Vec::new();

        for step in &mut template.selected_steps {
            if step.step_template.is_some() {
                continue;
            }
            match lookup(&step.step_template_id, step.step_template_ver) {
                Some(step_template) => step.step_template = Some(step_template),
                None => missing.push(format!(
                    "step template \"{}\" v{} referenced by step \"{}\" not found",
                    step.step_template_id, step.step_template_ver, step.id
                )),
            }
        }

        if missing.is_empty() {
            Ok(template)
        } else {
            Err(missing)
        }
    }
}
