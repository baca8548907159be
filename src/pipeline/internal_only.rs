//! The internal-only execution path.
//!
//! Structurally simpler fallback: only ever sees internal tools, so there
//! is nothing to gate and no external audit trail to write. Used directly
//! when a request has no external intent, and as the retry target when the
//! rich path fails mid-flight.

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::{EnvelopeBuilder, ExecutionPath, ResponseEnvelope};
use crate::error::PipelineError;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use crate::pipeline::executor::ToolCallExecutor;
use crate::pipeline::{AssistantPath, RequestContext, render};

/// Internal-tools-only assistant path.
#[derive(Debug, Clone)]
pub struct InternalOnlyPath {
    llm: Arc<dyn LlmClient>,
    executor: ToolCallExecutor,
}

impl InternalOnlyPath {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolCallExecutor) -> Self {
        Self { llm, executor }
    }

    fn system_prompt(ctx: &RequestContext) -> String {
        let mut prompt = String::from(
            "You are a workspace assistant with access to workspace data only. \
             Answer using the provided tools and the conversation.",
        );
        if let Some(context) = &ctx.workspace_context {
            prompt.push_str("\n\nWorkspace context:\n");
            prompt.push_str(context);
        }
        if ctx.intent.requires_external_tools {
            // The user asked for an external app we cannot reach on this
            // path; the model must say so rather than pretend.
            prompt.push_str(
                "\n\nThe user referenced external apps that are not available right now. \
                 Say that those apps are not connected or temporarily unavailable; never \
                 claim an external action was performed.",
            );
        }
        prompt
    }
}

#[async_trait]
impl AssistantPath for InternalOnlyPath {
    async fn run(&self, ctx: &RequestContext) -> Result<ResponseEnvelope, PipelineError> {
        let mut messages = vec![ChatMessage::system(Self::system_prompt(ctx))];
        messages.extend(ctx.history.iter().cloned());
        messages.push(ChatMessage::user(ctx.message.clone()));

        let first_turn = self
            .llm
            .complete(LlmRequest {
                messages: messages.clone(),
                tools: ctx.tools.function_schemas(),
            })
            .await
            .map_err(|e| PipelineError::ModelInvocation(e.to_string()))?;

        if first_turn.tool_calls.is_empty() {
            return Ok(
                EnvelopeBuilder::new(ExecutionPath::InternalOnly, ctx.intent.clone())
                    .response(first_turn.text)
                    .external_tools(false, false, Vec::new())
                    .build(),
            );
        }

        let results = self
            .executor
            .execute(
                first_turn.tool_calls.clone(),
                &ctx.tools,
                ctx,
                ExecutionPath::InternalOnly,
            )
            .await;

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

        Ok(
            EnvelopeBuilder::new(ExecutionPath::InternalOnly, ctx.intent.clone())
                .response(response_text)
                .sources(render::extract_sources(&results))
                .tool_results(render::results_to_values(&results))
                .external_tools(false, false, Vec::new())
                .build(),
        )
    }
}
