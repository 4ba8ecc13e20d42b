//! Pair each selected step with its template entry and step template

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::schema::{SelectedStep, Workflow};
use crate::error::{Result, WorkflowError};
use crate::templates::{StepTemplate, TemplateCatalog, TemplateSelectedStep, WorkflowTemplate};

/// A selected step together with what it was resolved against
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    pub selected_step: SelectedStep,
    /// The parent template's entry with the same id; `None` for foreign steps
    pub template_selected_step: Option<TemplateSelectedStep>,
    pub step_template: StepTemplate,
}

impl ResolvedStep {
    /// Whether the step was added by the caller rather than taken from the template
    pub fn is_foreign(&self) -> bool {
        self.template_selected_step.is_none()
    }
}

/// Resolution result, in manifest order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSteps {
    steps: Vec<ResolvedStep>,
    index: HashMap<String, usize>,
}

impl ResolvedSteps {
    pub fn get(&self, id: &str) -> Option<&ResolvedStep> {
        self.index.get(id).map(|i| &self.steps[*i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(&mut self, step: ResolvedStep) {
        self.index
            .insert(step.selected_step.id.clone(), self.steps.len());
        self.steps.push(step);
    }
}

impl FromIterator<ResolvedStep> for ResolvedSteps {
    fn from_iter<I: IntoIterator<Item = ResolvedStep>>(iter: I) -> Self {
        let mut resolved = ResolvedSteps::default();
        for step in iter {
            resolved.push(step);
        }
        resolved
    }
}

/// Fail with a validation error if two selected steps share an id
pub fn ensure_unique_step_ids<'a, I>(ids: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let duplicates: Vec<String> = ids
        .into_iter()
        .filter(|id| !seen.insert(*id))
        .map(|id| format!("/selectedSteps: duplicate step id \"{id}\""))
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(duplicates))
    }
}

/// Resolve every step of `workflow` against `template`.
///
/// Steps sharing an id with a template step use that entry and its step
/// template. Other steps are looked up in the catalog by their own step
/// template reference. Any miss aborts the whole resolution.
pub async fn resolve_steps(
    workflow: &Workflow,
    template: &WorkflowTemplate,
    catalog: &dyn TemplateCatalog,
) -> Result<ResolvedSteps> {
    ensure_unique_step_ids(workflow.selected_steps.iter().map(|s| s.id.as_str()))?;

    let template_steps: HashMap<&str, &TemplateSelectedStep> = template
        .selected_steps
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect();

    let mut resolved = ResolvedSteps::default();

    for selected_step in &workflow.selected_steps {
        let step = match template_steps.get(selected_step.id.as_str()) {
            Some(template_step) => {
                let step_template = match &template_step.step_template {
                    Some(step_template) => step_template.clone(),
                    None => {
                        catalog
                            .must_find_step_template(
                                &template_step.step_template_id,
                                template_step.step_template_ver,
                            )
                            .await?
                    }
                };
                ResolvedStep {
                    selected_step: selected_step.clone(),
                    template_selected_step: Some((*template_step).clone()),
                    step_template,
                }
            }
            None => {
                debug!(
                    "Step {} is not part of template {} v{}",
                    selected_step.id, template.id, template.v
                );
                let step_template = catalog
                    .must_find_step_template(
                        &selected_step.step_template_id,
                        selected_step.step_template_ver,
                    )
                    .await?;
                ResolvedStep {
                    selected_step: selected_step.clone(),
                    template_selected_step: None,
                    step_template,
                }
            }
        };
        resolved.push(step);
    }

    Ok(resolved)
}
