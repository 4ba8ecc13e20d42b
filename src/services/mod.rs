//! Cross-cutting collaborators of the definition services: caller context,
//! authorization, payload validation and auditing.

pub mod audit;
pub mod authorizer;
pub mod context;
pub mod validator;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use authorizer::{AdminAuthorizer, Authorizer};
pub use context::{Principal, RequestContext};
pub use validator::{JsonSchemaValidator, SchemaId, Validator};

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// Authorization, validation and audit shared by every service
#[derive(Clone)]
pub struct Guards {
    pub authorizer: Arc<dyn Authorizer>,
    pub validator: Arc<dyn Validator>,
    pub audit: Arc<dyn AuditSink>,
}

impl Guards {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        validator: Arc<dyn Validator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            authorizer,
            validator,
            audit,
        }
    }

    pub fn authorize(&self, ctx: &RequestContext, action: &str) -> Result<()> {
        self.authorizer.authorize(ctx, action)
    }

    pub fn validate(&self, schema: SchemaId, payload: &Value) -> Result<()> {
        self.validator.validate(schema, payload)
    }

    /// Record `body` for `action`; serialization failures are logged, not raised
    pub async fn audit<T: Serialize + Sync>(&self, ctx: &RequestContext, action: &str, body: &T) {
        match serde_json::to_value(body) {
            Ok(body) => self.audit.record(ctx.uid(), action, &body).await,
            Err(e) => warn!("Failed to serialize audit body for {}: {}", action, e),
        }
    }
}
