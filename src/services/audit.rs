//! Audit trail of successful mutations

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Receives one entry per successful create, update, publish or delete.
///
/// Recording never fails the operation that triggered it.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, actor: &str, action: &str, body: &Value);
}

/// Writes audit entries as structured events on the `audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, actor: &str, action: &str, body: &Value) {
        info!(target: "audit", actor, action, body = %body, "audit");
    }
}

/// A recorded audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub body: Value,
}

/// Keeps audit entries in memory, for embedding and inspection
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Actions recorded so far, oldest first
    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, actor: &str, action: &str, body: &Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(AuditEntry {
                actor: actor.to_string(),
                action: action.to_string(),
                body: body.clone(),
            });
        }
    }
}
