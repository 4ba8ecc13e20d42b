//! JSON Schema validation of request payloads

use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Context};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, WorkflowError};

/// Schemas payloads are validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaId {
    CreateWorkflow,
    UpdateWorkflow,
    CreateWorkflowDraft,
    UpdateWorkflowDraft,
    PublishWorkflowDraft,
    CreateWorkflowTemplateDraft,
    UpdateWorkflowTemplateDraft,
    PublishWorkflowTemplateDraft,
    CreateWorkflowTemplate,
    UpdateWorkflowTemplate,
}

impl SchemaId {
    pub fn all() -> &'static [SchemaId] {
        &[
            SchemaId::CreateWorkflow,
            SchemaId::UpdateWorkflow,
            SchemaId::CreateWorkflowDraft,
            SchemaId::UpdateWorkflowDraft,
            SchemaId::PublishWorkflowDraft,
            SchemaId::CreateWorkflowTemplateDraft,
            SchemaId::UpdateWorkflowTemplateDraft,
            SchemaId::PublishWorkflowTemplateDraft,
            SchemaId::CreateWorkflowTemplate,
            SchemaId::UpdateWorkflowTemplate,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaId::CreateWorkflow => "create-workflow",
            SchemaId::UpdateWorkflow => "update-workflow",
            SchemaId::CreateWorkflowDraft => "create-workflow-draft",
            SchemaId::UpdateWorkflowDraft => "update-workflow-draft",
            SchemaId::PublishWorkflowDraft => "publish-workflow-draft",
            SchemaId::CreateWorkflowTemplateDraft => "create-workflow-template-draft",
            SchemaId::UpdateWorkflowTemplateDraft => "update-workflow-template-draft",
            SchemaId::PublishWorkflowTemplateDraft => "publish-workflow-template-draft",
            SchemaId::CreateWorkflowTemplate => "create-workflow-template",
            SchemaId::UpdateWorkflowTemplate => "update-workflow-template",
        }
    }

    /// Embedded schema document
    pub fn source(&self) -> &'static str {
        match self {
            SchemaId::CreateWorkflow => include_str!("schemas/create-workflow.json"),
            SchemaId::UpdateWorkflow => include_str!("schemas/update-workflow.json"),
            SchemaId::CreateWorkflowDraft => include_str!("schemas/create-workflow-draft.json"),
            SchemaId::UpdateWorkflowDraft => include_str!("schemas/update-workflow-draft.json"),
            SchemaId::PublishWorkflowDraft => include_str!("schemas/publish-workflow-draft.json"),
            SchemaId::CreateWorkflowTemplateDraft => {
                include_str!("schemas/create-workflow-template-draft.json")
            }
            SchemaId::UpdateWorkflowTemplateDraft => {
                include_str!("schemas/update-workflow-template-draft.json")
            }
            SchemaId::PublishWorkflowTemplateDraft => {
                include_str!("schemas/publish-workflow-template-draft.json")
            }
            SchemaId::CreateWorkflowTemplate => {
                include_str!("schemas/create-workflow-template.json")
            }
            SchemaId::UpdateWorkflowTemplate => {
                include_str!("schemas/update-workflow-template.json")
            }
        }
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks payloads before any resolution or write happens
pub trait Validator: Send + Sync {
    /// Every violation of `schema` found in `payload`
    fn violations(&self, schema: SchemaId, payload: &Value) -> Vec<String>;

    fn validate(&self, schema: SchemaId, payload: &Value) -> Result<()> {
        let violations = self.violations(schema, payload);
        if violations.is_empty() {
            Ok(())
        } else {
            debug!("Payload rejected by {}: {:?}", schema, violations);
            Err(WorkflowError::Validation(violations))
        }
    }
}

/// Validator backed by the embedded schemas, each compiled once
pub struct JsonSchemaValidator {
    validators: HashMap<SchemaId, jsonschema::Validator>,
}

impl JsonSchemaValidator {
    pub fn new() -> anyhow::Result<Self> {
        let mut validators = HashMap::new();
        for schema_id in SchemaId::all() {
            let schema: Value = serde_json::from_str(schema_id.source())
                .with_context(|| format!("Failed to parse schema {}", schema_id))?;
            let validator = jsonschema::validator_for(&schema)
                .map_err(|e| anyhow!("Failed to compile schema {}: {}", schema_id, e))?;
            validators.insert(*schema_id, validator);
        }
        Ok(Self { validators })
    }
}

impl Validator for JsonSchemaValidator {
    fn violations(&self, schema: SchemaId, payload: &Value) -> Vec<String> {
        match self.validators.get(&schema) {
            Some(validator) => validator
                .iter_errors(payload)
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect(),
            None => vec![format!("no schema registered for {}", schema)],
        }
    }
}
