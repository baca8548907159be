//! JWT claims and the per-request user context.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    /// User ID (subject).
    pub sub: String,
    pub name: Option<String>,
    /// Workspaces this user belongs to.
    pub workspaces: Option<Vec<String>>,
    /// Member ids this user may act as, one per workspace membership.
    pub member_ids: Option<Vec<String>>,
    /// Expiration time (UNIX timestamp).
    pub exp: usize,
}

/// Authenticated identity injected into request extensions by the auth
/// middleware.
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: String,
    pub claims: UserClaims,
}

impl UserContext {
    /// Whether the caller may act as the claimed member id.
    #[must_use]
    pub fn owns_member(&self, member_id: &str) -> bool {
        self.claims
            .member_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == member_id))
    }

    /// Whether the caller belongs to the workspace.
    #[must_use]
    pub fn in_workspace(&self, workspace_id: &str) -> bool {
        self.claims
            .workspaces
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == workspace_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> UserContext {
        UserContext {
            user_id: "u-1".into(),
            claims: UserClaims {
                sub: "u-1".into(),
                name: Some("Alex".into()),
                workspaces: Some(vec!["ws-1".into()]),
                member_ids: Some(vec!["m-1".into()]),
                exp: 4_102_444_800,
            },
        }
    }

    #[test]
    fn test_member_ownership() {
        let ctx = context();
        assert!(ctx.owns_member("m-1"));
        assert!(!ctx.owns_member("m-2"));
    }

    #[test]
    fn test_workspace_membership() {
        let ctx = context();
        assert!(ctx.in_workspace("ws-1"));
        assert!(!ctx.in_workspace("ws-2"));
    }
}
