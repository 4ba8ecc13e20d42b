//! Workflows: manifests derived from workflow templates
//!
//! A submitted manifest flows through [`resolver::resolve_steps`],
//! [`defaults::merge_defaults`] and [`constraints::check_overrides`] before
//! the effective workflow is written as a version by [`WorkflowService`].

pub mod constraints;
pub mod defaults;
pub mod resolver;
pub mod schema;
pub mod service;

pub use constraints::{check_overrides, steps_order_changed};
pub use defaults::{merge_configs, merge_defaults, strip_empty_strings};
pub use resolver::{resolve_steps, ResolvedStep, ResolvedSteps};
pub use schema::{EffectiveStep, EffectiveWorkflow, SelectedStep, Workflow};
pub use service::{WorkflowRecord, WorkflowService, DEFAULT_VERSION};
