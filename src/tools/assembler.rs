//! Per-request tool assembly.
//!
//! Combines the static internal catalog with per-request external
//! definitions into one flat, name-keyed [`ToolSet`]. On a name collision
//! the internal definition wins: a trusted workspace capability is never
//! shadowed by whatever a third-party service chose to call its tool.

use serde_json::Value;

use super::{ToolDefinition, ToolSet};
use crate::pipeline::RequestContext;

/// Merge internal and external definitions into one request-scoped set.
///
/// `internal_enabled` is effectively always true today but kept explicit so
/// the call site documents the policy; `external` should already be
/// filtered to live connections by the resolver.
#[must_use]
pub fn assemble(
    internal_enabled: bool,
    internal: &[ToolDefinition],
    external: Vec<ToolDefinition>,
) -> ToolSet {
    let mut set = ToolSet::new();

    for def in external {
        set.insert(def);
    }

    if internal_enabled {
        for def in internal {
            if let Some(displaced) = set.insert(def.clone()) {
                tracing::warn!(
                    tool = %def.name,
                    displaced_app = ?displaced.origin.app(),
                    "External tool name collides with internal tool; internal wins"
                );
            }
        }
    }

    set
}

/// Inject required context parameters into a call's argument object.
///
/// Workspace and user identity always come from the authenticated request
/// context. Any model-supplied value under those keys is overwritten, so a
/// crafted tool call cannot impersonate another workspace or user.
#[must_use]
pub fn inject_context(
    def: &ToolDefinition,
    mut args: serde_json::Map<String, Value>,
    ctx: &RequestContext,
) -> Value {
    if def.context.needs_workspace_id {
        args.insert(
            "workspace_id".to_string(),
            Value::String(ctx.workspace_id.clone()),
        );
    }
    if def.context.needs_user_id {
        args.insert("user_id".to_string(), Value::String(ctx.user_id.clone()));
    }
    Value::Object(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use crate::tools::ContextRequirements;
    use crate::tools::testing::{external_def, internal_def};

    fn ctx() -> RequestContext {
        RequestContext::for_tests("ws-1", "user-1", Intent::internal("test"))
    }

    #[test]
    fn test_internal_wins_on_collision() {
        let internal = vec![internal_def("lookup")];
        let external = vec![external_def("lookup", "slack")];

        let set = assemble(true, &internal, external);
        assert_eq!(set.len(), 1);
        assert!(!set.get("lookup").unwrap().origin.is_external());
    }

    #[test]
    fn test_external_only_when_internal_disabled() {
        let internal = vec![internal_def("tasks_due")];
        let external = vec![external_def("gmail_send_email", "gmail")];

        let set = assemble(false, &internal, external);
        assert_eq!(set.len(), 1);
        assert!(set.contains("gmail_send_email"));
        assert!(!set.contains("tasks_due"));
    }

    #[test]
    fn test_context_injection_overwrites_model_values() {
        let mut def = internal_def("tasks_due");
        def.context = ContextRequirements {
            needs_workspace_id: true,
            needs_user_id: true,
        };

        // A crafted call trying to impersonate another workspace.
        let mut args = serde_json::Map::new();
        args.insert("workspace_id".into(), Value::String("ws-evil".into()));
        args.insert("user_id".into(), Value::String("admin".into()));
        args.insert("due".into(), Value::String("today".into()));

        let injected = inject_context(&def, args, &ctx());
        assert_eq!(injected["workspace_id"], "ws-1");
        assert_eq!(injected["user_id"], "user-1");
        assert_eq!(injected["due"], "today");
    }

    #[test]
    fn test_no_injection_when_not_required() {
        let def = external_def("gmail_send_email", "gmail");
        let injected = inject_context(&def, serde_json::Map::new(), &ctx());
        assert!(injected.get("workspace_id").is_none());
        assert!(injected.get("user_id").is_none());
    }
}
