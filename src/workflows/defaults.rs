//! Merge template defaults with caller overrides

use serde_json::{Map, Value};

use super::resolver::{ResolvedStep, ResolvedSteps};
use super::schema::{EffectiveStep, EffectiveWorkflow, Workflow};
use crate::templates::{ConfigOverrideOption, PropsOverrideOption, WorkflowTemplate};

/// Build the effective workflow. Inputs are left untouched.
///
/// Top-level props come from the template unless the manifest sets them.
/// Steps follow manifest order; every selected step must be present in
/// `resolved`, and steps missing from it are dropped.
pub fn merge_defaults(
    workflow: &Workflow,
    template: &WorkflowTemplate,
    resolved: &ResolvedSteps,
) -> EffectiveWorkflow {
    let selected_steps = workflow
        .selected_steps
        .iter()
        .filter_map(|step| resolved.get(&step.id))
        .map(merge_step)
        .collect();

    EffectiveWorkflow {
        id: workflow.id.clone(),
        workflow_template_id: workflow.workflow_template_id.clone(),
        workflow_template_ver: workflow.workflow_template_ver,
        title: workflow
            .title
            .clone()
            .unwrap_or_else(|| template.title.clone()),
        desc: workflow.desc.clone().unwrap_or_else(|| template.desc.clone()),
        instance_ttl: workflow.instance_ttl.unwrap_or(template.instance_ttl),
        builtin: workflow.builtin.unwrap_or(template.builtin),
        hidden: workflow.hidden.unwrap_or(template.hidden),
        run_spec: workflow
            .run_spec
            .clone()
            .unwrap_or_else(|| template.run_spec.clone()),
        selected_steps,
    }
}

fn merge_step(resolved: &ResolvedStep) -> EffectiveStep {
    let selected = &resolved.selected_step;
    let step_template = &resolved.step_template;
    let template_step = resolved.template_selected_step.as_ref();

    let title = selected
        .title
        .clone()
        .or_else(|| template_step.and_then(|t| t.title.clone()))
        .unwrap_or_else(|| step_template.title.clone());
    let desc = selected
        .desc
        .clone()
        .or_else(|| template_step.and_then(|t| t.desc.clone()))
        .unwrap_or_else(|| step_template.desc.clone());
    let skippable = selected
        .skippable
        .or_else(|| template_step.and_then(|t| t.skippable))
        .unwrap_or(step_template.skippable);

    let defaults = template_step.map(|t| &t.configs);
    let configs = merge_configs(defaults, &selected.configs);

    let (props_override_option, config_override_option) = match template_step {
        Some(t) => (
            t.props_override_option.clone(),
            t.config_override_option.clone(),
        ),
        None => (
            PropsOverrideOption::permissive_step(),
            ConfigOverrideOption::AllowList(
                step_template.input_manifest.interactive_field_names(),
            ),
        ),
    };

    EffectiveStep {
        id: selected.id.clone(),
        step_template_id: selected.step_template_id.clone(),
        step_template_ver: selected.step_template_ver,
        title,
        desc,
        skippable,
        src: step_template.src.clone(),
        configs,
        props_override_option,
        config_override_option,
        extra: selected.extra.clone(),
    }
}

/// Overlay `overrides` on `defaults`, then drop every `""` value
pub fn merge_configs(
    defaults: Option<&Map<String, Value>>,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = defaults.cloned().unwrap_or_default();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    strip_empty_strings(merged)
}

/// Remove keys whose value is the empty string; `0`, `false` and `null` stay
pub fn strip_empty_strings(configs: Map<String, Value>) -> Map<String, Value> {
    configs
        .into_iter()
        .filter(|(_, value)| value.as_str() != Some(""))
        .collect()
}
