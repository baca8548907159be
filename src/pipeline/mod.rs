//! The orchestration pipeline.
//!
//! One inbound request flows through classification, capability assembly,
//! a model turn, the confirmation gate, execution, and a follow-up model
//! turn. All per-request state travels in an explicit [`RequestContext`]
//! passed by reference through each stage; there is no ambient lookup.
//!
//! Two [`AssistantPath`] implementations exist: [`rich::RichPath`]
//! (external-capability-aware) and [`internal_only::InternalOnlyPath`].
//! The [`controller::AssistantController`] tries one then the other and
//! guarantees both converge on the same [`ResponseEnvelope`] shape.

pub mod confirmation;
pub mod controller;
pub mod executor;
pub mod internal_only;
pub mod render;
pub mod rich;

use async_trait::async_trait;

use crate::envelope::ResponseEnvelope;
use crate::error::PipelineError;
use crate::intent::Intent;
use crate::llm::{ChatMessage, Role};
use crate::tools::ToolSet;

/// Per-request state threaded through every pipeline stage.
///
/// Created fresh for each HTTP request and discarded at response time;
/// capability scoping is never cached across requests because connected-app
/// state can change between them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub workspace_id: String,
    pub member_id: Option<String>,
    /// The authenticated user identity injected into internal tool calls.
    pub user_id: String,
    pub workspace_context: Option<String>,
    pub message: String,
    /// Sanitized conversation history (user/assistant roles only).
    pub history: Vec<ChatMessage>,
    pub intent: Intent,
    /// The flat tool set assembled for this request.
    pub tools: ToolSet,
    pub external_enabled: bool,
    pub connected_apps: Vec<String>,
}

impl RequestContext {
    /// Composite identifier scoping third-party connections. Stable member
    /// identity, never raw email or display name.
    #[must_use]
    pub fn entity_id(&self) -> String {
        let member = self.member_id.as_deref().unwrap_or(&self.user_id);
        format!("{}:{member}", self.workspace_id)
    }

    /// Key under which a pending confirmation for this caller is stored.
    #[must_use]
    pub fn pending_key(&self) -> String {
        self.entity_id()
    }

    #[cfg(test)]
    #[must_use]
    pub fn for_tests(workspace_id: &str, user_id: &str, intent: Intent) -> Self {
        Self {
            request_id: "req-test".to_string(),
            workspace_id: workspace_id.to_string(),
            member_id: None,
            user_id: user_id.to_string(),
            workspace_context: None,
            message: String::new(),
            history: Vec::new(),
            intent,
            tools: ToolSet::new(),
            external_enabled: false,
            connected_apps: Vec::new(),
        }
    }
}

/// One execution path of the assistant.
///
/// Both implementations must emit a schema-identical [`ResponseEnvelope`];
/// the shared contract test suite in `tests/` asserts this.
#[async_trait]
pub trait AssistantPath: Send + Sync {
    async fn run(&self, ctx: &RequestContext) -> Result<ResponseEnvelope, PipelineError>;
}

/// Sanitize caller-supplied conversation history.
///
/// Only `user`/`assistant` roles are honored (a `system` entry injected by
/// a malicious client is dropped) and control characters are stripped from
/// content.
#[must_use]
pub fn sanitize_history(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    history
        .into_iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|mut m| {
            m.content = strip_control_chars(&m.content);
            m.tool_call_id = None;
            m.tool_calls = None;
            m
        })
        .collect()
}

fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
