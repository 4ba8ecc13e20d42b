//! Caller identity attached to every service call

use serde::{Deserialize, Serialize};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub uid: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    pub fn new(uid: impl Into<String>, username: impl Into<String>, is_admin: bool) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            is_admin,
        }
    }
}

/// Request-scoped context passed into every service operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Principal,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Actor id recorded on writes and audit entries
    pub fn uid(&self) -> &str {
        &self.principal.uid
    }
}
