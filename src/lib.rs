//! workflow-admin: versioned workflow and workflow template definitions
//!
//! A workflow is derived from a workflow template and may override the
//! template's properties and step configs only where the template's
//! override policies allow it. Workflows and admin-authored templates are
//! stored as immutable-by-version records guarded by optimistic
//! concurrency, and can be edited through per-user drafts.

pub mod config;
pub mod drafts;
pub mod error;
pub mod logging;
pub mod rest;
pub mod services;
pub mod store;
pub mod templates;
pub mod versions;
pub mod workflows;

pub use error::{Result, WorkflowError};
