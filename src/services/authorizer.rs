//! Gate for mutating operations

use tracing::debug;

use super::context::RequestContext;
use crate::error::{Result, WorkflowError};

/// Decides whether the caller may perform `action`
pub trait Authorizer: Send + Sync {
    fn authorize(&self, ctx: &RequestContext, action: &str) -> Result<()>;
}

/// Only administrators may mutate definitions
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminAuthorizer;

impl Authorizer for AdminAuthorizer {
    fn authorize(&self, ctx: &RequestContext, action: &str) -> Result<()> {
        if ctx.principal.is_admin {
            return Ok(());
        }
        debug!(
            "Rejected {} for non-admin {}",
            action, ctx.principal.username
        );
        Err(WorkflowError::Unauthorized(format!(
            "{} must be an administrator to {}",
            ctx.principal.username, action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::context::Principal;

    #[test]
    fn test_admin_allowed() {
        let ctx = RequestContext::new(Principal::new("u1", "alice", true));
        assert!(AdminAuthorizer.authorize(&ctx, "create-workflow").is_ok());
    }

    #[test]
    fn test_non_admin_rejected() {
        let ctx = RequestContext::new(Principal::new("u2", "bob", false));
        let err = AdminAuthorizer
            .authorize(&ctx, "delete-workflow")
            .unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
        assert!(err.to_string().contains("bob"));
        assert!(err.to_string().contains("delete-workflow"));
    }
}
