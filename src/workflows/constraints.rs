//! Enforce template override policies on an effective workflow

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::defaults::strip_empty_strings;
use super::resolver::ResolvedSteps;
use super::schema::{EffectiveStep, EffectiveWorkflow};
use crate::error::{Result, WorkflowError};
use crate::templates::{RunSpec, StepSource, StepTemplate, TemplateSelectedStep, WorkflowTemplate};

/// Whether the manifest steps differ from the template steps in order or
/// membership. Compares position by position and stops at the first
/// difference.
pub fn steps_order_changed(steps: &[EffectiveStep], template_steps: &[TemplateSelectedStep]) -> bool {
    if steps.len() != template_steps.len() {
        return true;
    }
    steps.iter().zip(template_steps).any(|(step, template_step)| {
        step.id != template_step.id
            || !template_step.references(&step.step_template_id, step.step_template_ver)
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowProps<'a> {
    title: &'a str,
    desc: &'a str,
    instance_ttl: i64,
    run_spec: &'a RunSpec,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepProps<'a> {
    title: &'a str,
    desc: &'a str,
    skippable: bool,
    src: &'a StepSource,
}

fn to_map<T: Serialize>(props: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(props)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Keys of `source` whose value differs in `target`
fn changed_props(source: &Map<String, Value>, target: &Map<String, Value>) -> Vec<String> {
    source
        .iter()
        .filter(|(key, value)| target.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Keys added, removed or changed in `configs` relative to `defaults`
fn changed_configs(defaults: &Map<String, Value>, configs: &Map<String, Value>) -> BTreeSet<String> {
    let defaults = strip_empty_strings(defaults.clone());
    defaults
        .keys()
        .chain(configs.keys())
        .filter(|key| defaults.get(*key) != configs.get(*key))
        .cloned()
        .collect()
}

fn step_source_props(
    step_template: &StepTemplate,
    template_step: &TemplateSelectedStep,
) -> Result<Map<String, Value>> {
    let title = template_step
        .title
        .as_deref()
        .unwrap_or(&step_template.title);
    let desc = template_step.desc.as_deref().unwrap_or(&step_template.desc);
    to_map(&StepProps {
        title,
        desc,
        skippable: template_step.skippable.unwrap_or(step_template.skippable),
        src: &step_template.src,
    })
}

/// Check every override in `workflow` against `template`'s policies.
///
/// All violations are collected into one forbidden error.
pub fn check_overrides(
    workflow: &EffectiveWorkflow,
    template: &WorkflowTemplate,
    resolved: &ResolvedSteps,
) -> Result<()> {
    let mut violations = Vec::new();

    let source = to_map(&WorkflowProps {
        title: &template.title,
        desc: &template.desc,
        instance_ttl: template.instance_ttl,
        run_spec: &template.run_spec,
    })?;
    let target = to_map(&WorkflowProps {
        title: &workflow.title,
        desc: &workflow.desc,
        instance_ttl: workflow.instance_ttl,
        run_spec: &workflow.run_spec,
    })?;

    let policy = &template.props_override_option;
    for key in changed_props(&source, &target) {
        if !policy.is_allowed(&key) {
            violations.push(format!(
                "workflow {}: \"{}\" cannot be overridden (template {} v{})",
                workflow.id, key, template.id, template.v
            ));
        }
    }

    if !policy.allows_steps_order_change()
        && steps_order_changed(&workflow.selected_steps, &template.selected_steps)
    {
        violations.push(format!(
            "workflow {}: steps cannot be added, removed or reordered (template {} v{})",
            workflow.id, template.id, template.v
        ));
    }

    for step in &workflow.selected_steps {
        let Some(resolved_step) = resolved.get(&step.id) else {
            continue;
        };
        let Some(template_step) = &resolved_step.template_selected_step else {
            continue;
        };

        let source = step_source_props(&resolved_step.step_template, template_step)?;
        let target = to_map(&StepProps {
            title: &step.title,
            desc: &step.desc,
            skippable: step.skippable,
            src: &step.src,
        })?;
        for key in changed_props(&source, &target) {
            if !template_step.props_override_option.is_allowed(&key) {
                violations.push(format!(
                    "step {}: \"{}\" cannot be overridden",
                    step.id, key
                ));
            }
        }

        for key in changed_configs(&template_step.configs, &step.configs) {
            if !template_step
                .config_override_option
                .is_allowed(&key, &template_step.configs)
            {
                violations.push(format!(
                    "step {}: config \"{}\" cannot be overridden",
                    step.id, key
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(violations))
    }
}
