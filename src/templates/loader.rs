//! Template plugins and filesystem loading
//!
//! A plugin contributes step templates and workflow templates to the
//! registry at bootstrap. Builtins are embedded in the binary; additional
//! definitions can be dropped into a directory laid out as:
//!
//! ```text
//! <root>/step-templates/*.json
//! <root>/workflow-templates/*.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::schema::{StepTemplate, WorkflowTemplate};

const STEP_TEMPLATES_DIR: &str = "step-templates";
const WORKFLOW_TEMPLATES_DIR: &str = "workflow-templates";

/// Definitions contributed by one plugin
#[derive(Debug, Clone, Default)]
pub struct TemplateDefinitions {
    pub step_templates: Vec<StepTemplate>,
    pub workflow_templates: Vec<WorkflowTemplate>,
}

/// Source of template definitions consulted once at registry bootstrap
pub trait TemplatePlugin: Send + Sync {
    /// Plugin name, used in logs
    fn name(&self) -> &str;

    /// Load every definition this plugin contributes.
    ///
    /// Individual invalid definitions are skipped with a warning; an error
    /// here means the plugin as a whole could not be read.
    fn load(&self) -> Result<TemplateDefinitions>;
}

/// Definitions compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPlugin;

impl BuiltinPlugin {
    const STEP_TEMPLATES: &'static [(&'static str, &'static str)] = &[
        (
            "st-obtain-write-lock",
            include_str!("builtin/step-templates/st-obtain-write-lock.json"),
        ),
        (
            "st-release-write-lock",
            include_str!("builtin/step-templates/st-release-write-lock.json"),
        ),
        (
            "st-create-appstream-fleet",
            include_str!("builtin/step-templates/st-create-appstream-fleet.json"),
        ),
        ("st-notify", include_str!("builtin/step-templates/st-notify.json")),
    ];

    const WORKFLOW_TEMPLATES: &'static [(&'static str, &'static str)] = &[
        ("wt-empty", include_str!("builtin/workflow-templates/wt-empty.json")),
        (
            "wt-provision-fleet",
            include_str!("builtin/workflow-templates/wt-provision-fleet.json"),
        ),
    ];
}

impl TemplatePlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        "builtin"
    }

    fn load(&self) -> Result<TemplateDefinitions> {
        Ok(TemplateDefinitions {
            step_templates: parse_embedded(Self::STEP_TEMPLATES),
            workflow_templates: parse_embedded(Self::WORKFLOW_TEMPLATES),
        })
    }
}

fn parse_embedded<T: DeserializeOwned>(sources: &[(&str, &str)]) -> Vec<T> {
    sources
        .iter()
        .filter_map(|(name, json)| match serde_json::from_str(json) {
            Ok(definition) => {
                debug!("Loaded builtin template definition: {}", name);
                Some(definition)
            }
            Err(e) => {
                warn!("Failed to parse builtin template {}: {}", name, e);
                None
            }
        })
        .collect()
}

/// Definitions read from JSON files in a directory
#[derive(Debug, Clone)]
pub struct DirectoryPlugin {
    root: PathBuf,
}

impl DirectoryPlugin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplatePlugin for DirectoryPlugin {
    fn name(&self) -> &str {
        "directory"
    }

    fn load(&self) -> Result<TemplateDefinitions> {
        Ok(TemplateDefinitions {
            step_templates: load_json_dir(&self.root.join(STEP_TEMPLATES_DIR))?,
            workflow_templates: load_json_dir(&self.root.join(WORKFLOW_TEMPLATES_DIR))?,
        })
    }
}

/// Parse every `*.json` file in `path`, skipping invalid ones.
///
/// A missing directory yields no definitions.
pub fn load_json_dir<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut definitions = Vec::new();

    if !path.exists() {
        debug!("Template directory does not exist: {}", path.display());
        return Ok(definitions);
    }

    let entries = fs::read_dir(path)
        .with_context(|| format!("Failed to read template directory: {}", path.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();

    for file_path in files {
        match load_json_file(&file_path) {
            Ok(definition) => {
                debug!("Loaded template definition from {}", file_path.display());
                definitions.push(definition);
            }
            Err(e) => {
                warn!(
                    "Failed to load template definition from {}: {:#}",
                    file_path.display(),
                    e
                );
            }
        }
    }

    Ok(definitions)
}

fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))
}
