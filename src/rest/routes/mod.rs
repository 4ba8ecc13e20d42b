//! Route handlers for the REST API.

pub mod drafts;
pub mod health;
pub mod step_templates;
pub mod workflow_templates;
pub mod workflows;
