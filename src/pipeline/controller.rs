//! The dual-path fallback controller.
//!
//! Entry point for every assistant request. Orchestrates classification,
//! pending-confirmation decisions, capability resolution, path selection,
//! and the rich-then-internal fallback contract. Whatever happens inside,
//! the caller receives a [`ResponseEnvelope`]: a degraded answer or a
//! structured error payload, never a raw exception.

use std::sync::Arc;

use uuid::Uuid;

use crate::envelope::{Action, EnvelopeBuilder, ExecutionPath, ResponseEnvelope};
use crate::error::PipelineError;
use crate::intent::{Intent, IntentClassifier, IntentMode};
use crate::llm::ChatMessage;
use crate::pending::{PendingAction, PendingActionStore};
use crate::pipeline::confirmation::{self, ConfirmationDecision};
use crate::pipeline::executor::ToolCallExecutor;
use crate::pipeline::internal_only::InternalOnlyPath;
use crate::pipeline::rich::RichPath;
use crate::pipeline::{AssistantPath, RequestContext, render, sanitize_history};
use crate::tools::external::ExternalToolResolver;
use crate::tools::internal::InternalToolRegistry;
use crate::tools::{ToolSet, assembler::assemble};

/// Parsed, authenticated inbound request.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub workspace_id: String,
    pub member_id: Option<String>,
    /// Authenticated caller identity.
    pub user_id: String,
    pub workspace_context: Option<String>,
    pub message: String,
    pub history: Vec<ChatMessage>,
}

/// Orchestrates the whole pipeline for one request at a time.
#[derive(Debug, Clone)]
pub struct AssistantController {
    classifier: IntentClassifier,
    internal: Arc<InternalToolRegistry>,
    resolver: ExternalToolResolver,
    pending: PendingActionStore,
    executor: ToolCallExecutor,
    rich: Arc<RichPath>,
    internal_only: Arc<InternalOnlyPath>,
}

impl AssistantController {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: IntentClassifier,
        internal: Arc<InternalToolRegistry>,
        resolver: ExternalToolResolver,
        pending: PendingActionStore,
        executor: ToolCallExecutor,
        rich: Arc<RichPath>,
        internal_only: Arc<InternalOnlyPath>,
    ) -> Self {
        Self {
            classifier,
            internal,
            resolver,
            pending,
            executor,
            rich,
            internal_only,
        }
    }

    /// Handle to the pending-confirmation store, for periodic TTL sweeps.
    #[must_use]
    pub fn pending_store(&self) -> PendingActionStore {
        self.pending.clone()
    }

    /// Names of the registered internal tools.
    #[must_use]
    pub fn internal_tool_names(&self) -> Vec<String> {
        self.internal
            .tools()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// Handle one request end to end. Always returns an envelope.
    pub async fn handle(&self, request: AssistantRequest) -> ResponseEnvelope {
        let request_id = Uuid::new_v4().to_string();
        let history = sanitize_history(request.history.clone());

        let mut ctx = RequestContext {
            request_id: request_id.clone(),
            workspace_id: request.workspace_id.clone(),
            member_id: request.member_id.clone(),
            user_id: request.user_id.clone(),
            workspace_context: request.workspace_context.clone(),
            message: request.message.clone(),
            history,
            intent: Intent::internal("not yet classified"),
            tools: ToolSet::new(),
            external_enabled: false,
            connected_apps: Vec::new(),
        };

        // A parked confirmation takes precedence over fresh classification:
        // the user's turn is a decision signal, not a new request.
        if let Some(pending) = self.pending.get(&ctx.pending_key()).await {
            return self.handle_decision_turn(&mut ctx, pending).await;
        }

        ctx.intent = self.classifier.classify(&ctx.message, &ctx.history);
        tracing::info!(
            request_id = %request_id,
            mode = ?ctx.intent.mode,
            requires_external = ctx.intent.requires_external_tools,
            apps = ?ctx.intent.requested_apps,
            "Intent classified"
        );

        if !ctx.intent.requires_external_tools {
            return self.run_internal(ctx, false, None).await;
        }

        // External intent: resolve live connections before offering tools.
        let resolution = self
            .resolver
            .resolve(&ctx.intent.requested_apps, &ctx.entity_id())
            .await;

        if resolution.tools.is_empty() {
            let reason = resolution.failure.clone();
            if ctx.intent.mode == IntentMode::External {
                // Nothing internal to fall back on: say plainly that no
                // connection exists instead of letting a model improvise an
                // action that never happened.
                return self.no_connection_envelope(&ctx, reason);
            }
            return self.run_internal(ctx, false, reason).await;
        }

        ctx.tools = assemble(true, self.internal.tools(), resolution.tools);
        ctx.external_enabled = true;
        ctx.connected_apps = resolution.connected_apps;

        match self.rich.run(&ctx).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Rich path failed; retrying on internal-only path"
                );
                self.run_internal(ctx, true, Some(e.to_string())).await
            }
        }
    }

    /// Run the internal-only path with a fresh internal tool set.
    async fn run_internal(
        &self,
        mut ctx: RequestContext,
        fallback_attempted: bool,
        fallback_reason: Option<String>,
    ) -> ResponseEnvelope {
        ctx.tools = assemble(true, self.internal.tools(), Vec::new());
        ctx.external_enabled = false;
        ctx.connected_apps = Vec::new();

        match self.internal_only.run(&ctx).await {
            Ok(mut envelope) => {
                envelope.metadata.fallback.attempted = fallback_attempted;
                envelope.metadata.fallback.reason = fallback_reason;
                envelope
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Internal-only path failed; returning structured error"
                );
                self.error_envelope(&ctx, &e, fallback_attempted, fallback_reason)
            }
        }
    }

    /// Handle the turn after a confirmation prompt.
    async fn handle_decision_turn(
        &self,
        ctx: &mut RequestContext,
        pending: PendingAction,
    ) -> ResponseEnvelope {
        ctx.intent = Intent {
            mode: IntentMode::External,
            requires_external_tools: true,
            requested_apps: pending.requested_apps.clone(),
            reasoning: "decision on a pending confirmation".to_string(),
        };

        match confirmation::parse_decision(&ctx.message) {
            ConfirmationDecision::Cancel => {
                self.pending.take(&ctx.pending_key()).await;
                tracing::info!(
                    request_id = %ctx.request_id,
                    gate_state = ?confirmation::GateState::Cancelled,
                    "Pending action cancelled"
                );
                EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
                    .response("Cancelled. No action was taken.")
                    .external_tools(false, false, Vec::new())
                    .build()
            }
            ConfirmationDecision::Unclear => {
                // Keep the action parked and re-prompt.
                EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
                    .response(format!(
                        "I still need an explicit yes or no before proceeding.\n\n{}",
                        confirmation::confirmation_prompt(&pending.summary)
                    ))
                    .external_tools(false, false, Vec::new())
                    .build()
            }
            ConfirmationDecision::Confirm => {
                let Some(pending) = self.pending.take(&ctx.pending_key()).await else {
                    // Raced with TTL expiry; nothing to execute.
                    return EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
                        .response(
                            "That confirmation expired. Please repeat the original request.",
                        )
                        .external_tools(false, false, Vec::new())
                        .build();
                };
                self.execute_confirmed(ctx, pending).await
            }
        }
    }

    /// Execute the original (never re-generated) tool-call set.
    async fn execute_confirmed(
        &self,
        ctx: &RequestContext,
        pending: PendingAction,
    ) -> ResponseEnvelope {
        // Connections may have changed since the proposal; re-resolve so
        // the executors reflect the current connection state.
        let resolution = self
            .resolver
            .resolve(&pending.requested_apps, &ctx.entity_id())
            .await;
        let connected_apps = resolution.connected_apps.clone();
        let tools = assemble(true, self.internal.tools(), resolution.tools);

        let mut exec_ctx = ctx.clone();
        exec_ctx.tools = tools.clone();
        exec_ctx.external_enabled = !connected_apps.is_empty();
        exec_ctx.connected_apps.clone_from(&connected_apps);

        tracing::info!(
            request_id = %ctx.request_id,
            gate_state = ?confirmation::GateState::Confirmed,
            calls = pending.calls.len(),
            "Confirmation received; executing original call set"
        );

        let results = self
            .executor
            .execute(pending.calls, &tools, &exec_ctx, ExecutionPath::Rich)
            .await;

        let external_used = render::external_used(&results, &tools);
        EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
            .response(render::partial_results_summary(&results))
            .actions(render::build_actions(&results, &tools))
            .tool_results(render::results_to_values(&results))
            .external_tools(exec_ctx.external_enabled, external_used, connected_apps)
            .build()
    }

    fn no_connection_envelope(
        &self,
        ctx: &RequestContext,
        reason: Option<String>,
    ) -> ResponseEnvelope {
        let apps: Vec<&str> = ctx
            .intent
            .requested_apps
            .iter()
            .map(String::as_str)
            .collect();
        let apps = if apps.is_empty() {
            "the requested app".to_string()
        } else {
            apps.join(", ")
        };

        let actions: Vec<Action> = Vec::new();
        EnvelopeBuilder::new(ExecutionPath::InternalOnly, ctx.intent.clone())
            .response(format!(
                "I can't do that yet: there is no active connection for {apps}. \
                 Connect it from your workspace integrations page and ask me again."
            ))
            .actions(actions)
            .external_tools(false, false, Vec::new())
            .fallback(false, reason)
            .build()
    }

    fn error_envelope(
        &self,
        ctx: &RequestContext,
        error: &PipelineError,
        fallback_attempted: bool,
        fallback_reason: Option<String>,
    ) -> ResponseEnvelope {
        let reason = fallback_reason.or_else(|| Some(error.to_string()));
        EnvelopeBuilder::new(ExecutionPath::InternalOnly, ctx.intent.clone())
            .failure(error.code())
            .response(error.user_message())
            .external_tools(false, false, Vec::new())
            .fallback(fallback_attempted, reason)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_request_is_cloneable() {
        let request = AssistantRequest {
            workspace_id: "ws-1".into(),
            member_id: None,
            user_id: "u-1".into(),
            workspace_context: None,
            message: "hello".into(),
            history: Vec::new(),
        };
        let clone = request.clone();
        assert_eq!(clone.workspace_id, "ws-1");
    }
}
