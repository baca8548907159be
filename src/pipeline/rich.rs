//! The rich execution path.
//!
//! External-capability-aware: sees the full assembled tool set, gates
//! high-impact external actions behind the confirmation checkpoint, and
//! feeds tool results into a follow-up model turn. Any
//! [`PipelineError`] raised here is caught by the controller and retried on
//! the internal-only path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::envelope::{Action, EnvelopeBuilder, ExecutionPath, ResponseEnvelope};
use crate::error::PipelineError;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use crate::pending::{PendingAction, PendingActionStore};
use crate::pipeline::executor::ToolCallExecutor;
use crate::pipeline::{AssistantPath, RequestContext, confirmation, render};

/// External-capability-aware assistant path.
#[derive(Debug, Clone)]
pub struct RichPath {
    llm: Arc<dyn LlmClient>,
    executor: ToolCallExecutor,
    pending: PendingActionStore,
}

impl RichPath {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolCallExecutor,
        pending: PendingActionStore,
    ) -> Self {
        Self {
            llm,
            executor,
            pending,
        }
    }

    fn system_prompt(ctx: &RequestContext) -> String {
        let mut prompt = String::from(
            "You are a workspace assistant. Answer using only the provided tools \
             and the conversation. Never claim an external action happened unless \
             a tool result confirms it.",
        );
        if let Some(context) = &ctx.workspace_context {
            prompt.push_str("\n\nWorkspace context:\n");
            prompt.push_str(context);
        }
        if ctx.connected_apps.is_empty() {
            prompt.push_str("\n\nNo external apps are connected for this user.");
        } else {
            prompt.push_str("\n\nConnected apps: ");
            prompt.push_str(&ctx.connected_apps.join(", "));
        }
        let unconnected: Vec<&str> = ctx
            .intent
            .requested_apps
            .iter()
            .filter(|app| !ctx.connected_apps.contains(*app))
            .map(String::as_str)
            .collect();
        if !unconnected.is_empty() {
            prompt.push_str(
                "\n\nThe user referenced apps with no active connection: ",
            );
            prompt.push_str(&unconnected.join(", "));
            prompt.push_str(". Tell the user those apps are not connected instead of improvising.");
        }
        prompt
    }

    fn base_messages(ctx: &RequestContext) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(Self::system_prompt(ctx))];
        messages.extend(ctx.history.iter().cloned());
        messages.push(ChatMessage::user(ctx.message.clone()));
        messages
    }
}

#[async_trait]
impl AssistantPath for RichPath {
    async fn run(&self, ctx: &RequestContext) -> Result<ResponseEnvelope, PipelineError> {
        let messages = Self::base_messages(ctx);
        let tools = ctx.tools.function_schemas();

        let first_turn = self
            .llm
            .complete(LlmRequest {
                messages: messages.clone(),
                tools,
            })
            .await
            .map_err(|e| PipelineError::ModelInvocation(e.to_string()))?;

        if first_turn.tool_calls.is_empty() {
            return Ok(EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
                .response(first_turn.text)
                .external_tools(ctx.external_enabled, false, ctx.connected_apps.clone())
                .build());
        }

        // Gate check before anything executes.
        let analysis = confirmation::analyze(&first_turn.tool_calls, &ctx.tools);
        if analysis.requires_confirmation {
            tracing::info!(
                request_id = %ctx.request_id,
                gate_state = ?confirmation::GateState::AwaitingConfirmation,
                gated = analysis.affected_actions.len(),
                "Confirmation gate engaged; deferring execution"
            );

            self.pending
                .put(
                    ctx.pending_key(),
                    PendingAction {
                        workspace_id: ctx.workspace_id.clone(),
                        member_id: ctx.member_id.clone(),
                        calls: first_turn.tool_calls.clone(),
                        requested_apps: ctx.intent.requested_apps.clone(),
                        summary: analysis.risk_summary.clone(),
                        created_at: Utc::now(),
                    },
                )
                .await;

            let actions: Vec<Action> = analysis
                .affected_actions
                .iter()
                .map(|call| Action {
                    tool: call.tool_name.clone(),
                    app: ctx
                        .tools
                        .get(&call.tool_name)
                        .and_then(|d| d.origin.app())
                        .map(String::from),
                    status: "pending_confirmation".to_string(),
                })
                .collect();

            return Ok(EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
                .response(confirmation::confirmation_prompt(&analysis.risk_summary))
                .actions(actions)
                .external_tools(ctx.external_enabled, false, ctx.connected_apps.clone())
                .build());
        }

        let results = self
            .executor
            .execute(
                first_turn.tool_calls.clone(),
                &ctx.tools,
                ctx,
                ExecutionPath::Rich,
            )
            .await;

        // Follow-up turn with the tool results. If it fails we still return
        // the partial outcome rather than a hard error.
        let mut followup_messages = messages;
        followup_messages.push(ChatMessage::assistant_tool_calls(
            first_turn.text.clone(),
            &first_turn.tool_calls,
        ));
        for result in &results {
            let content = serde_json::to_string(result).unwrap_or_default();
            followup_messages.push(ChatMessage::tool_result(result.call_id.clone(), content));
        }

        let response_text = match self
            .llm
            .complete(LlmRequest {
                messages: followup_messages,
                tools: Vec::new(),
            })
            .await
        {
            Ok(turn) => turn.text,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Follow-up model turn failed; returning partial tool summary"
                );
                render::partial_results_summary(&results)
            }
        };

        let external_used = render::external_used(&results, &ctx.tools);
        Ok(EnvelopeBuilder::new(ExecutionPath::Rich, ctx.intent.clone())
            .response(response_text)
            .sources(render::extract_sources(&results))
            .actions(render::build_actions(&results, &ctx.tools))
            .tool_results(render::results_to_values(&results))
            .external_tools(
                ctx.external_enabled,
                external_used,
                ctx.connected_apps.clone(),
            )
            .build())
    }
}
