//! Tool call execution.
//!
//! Runs confirmed or non-gated tool calls with per-call failure isolation:
//! one failing call is captured as an error result and never aborts its
//! siblings. Execution is concurrency-bounded per request so a burst of
//! parallel calls cannot overwhelm third-party rate limits, and the whole
//! batch runs inside a spawned task so a caller disconnect cannot cancel a
//! mutating external call that is already in flight.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;

use crate::audit::{AuditLogger, AuditRecord};
use crate::envelope::ExecutionPath;
use crate::pipeline::RequestContext;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolSet, assembler};

/// Default per-request tool concurrency bound.
pub const DEFAULT_TOOL_CONCURRENCY: usize = 4;

/// Executes tool-call batches and writes the audit trail.
#[derive(Debug, Clone)]
pub struct ToolCallExecutor {
    audit: AuditLogger,
    concurrency: usize,
}

impl ToolCallExecutor {
    #[must_use]
    pub fn new(audit: AuditLogger, concurrency: usize) -> Self {
        Self {
            audit,
            concurrency: concurrency.max(1),
        }
    }

    /// Execute every call in the batch and return one result per call,
    /// in the original request order, correlated by `call_id`.
    ///
    /// Every external call, success or failure, produces exactly one
    /// audit record before this function returns. A request/result count
    /// mismatch is logged as a warning rather than silently dropped.
    pub async fn execute(
        &self,
        calls: Vec<ToolCallRequest>,
        tools: &ToolSet,
        ctx: &RequestContext,
        path: ExecutionPath,
    ) -> Vec<ToolCallResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let executor = self.clone();
        let tools = tools.clone();
        let ctx = Arc::new(ctx.clone());
        let expected = calls.len();
        let order: Vec<String> = calls.iter().map(|c| c.call_id.clone()).collect();

        // Spawned so an abandoned HTTP connection cannot cancel dispatched
        // external mutations mid-flight.
        let handle = tokio::spawn(async move {
            stream::iter(calls)
                .map(|call| {
                    let executor = executor.clone();
                    let tools = tools.clone();
                    let ctx = Arc::clone(&ctx);
                    async move { executor.execute_one(call, &tools, &ctx, path).await }
                })
                .buffer_unordered(executor.concurrency)
                .collect::<Vec<ToolCallResult>>()
                .await
        });

        let mut results = match handle.await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "Tool execution task failed");
                Vec::new()
            }
        };

        if results.len() != expected {
            tracing::warn!(
                requested = expected,
                returned = results.len(),
                "Tool call result count does not match request count"
            );
        }

        // Restore request order; correlation stays by call_id, never index.
        results.sort_by_key(|r| order.iter().position(|id| *id == r.call_id));
        results
    }

    async fn execute_one(
        &self,
        call: ToolCallRequest,
        tools: &ToolSet,
        ctx: &RequestContext,
        path: ExecutionPath,
    ) -> ToolCallResult {
        let Some(def) = tools.get(&call.tool_name) else {
            tracing::warn!(tool = %call.tool_name, "Model requested unknown tool");
            return ToolCallResult::failed(&call, format!("unknown tool: {}", call.tool_name));
        };

        let args = assembler::inject_context(def, call.arguments.clone(), ctx);

        tracing::info!(
            request_id = %ctx.request_id,
            tool = %call.tool_name,
            call_id = %call.call_id,
            external = def.origin.is_external(),
            "Executing tool call"
        );

        let result = match def.executor.call(args.clone()).await {
            Ok(payload) => ToolCallResult::ok(&call, payload),
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    tool = %call.tool_name,
                    call_id = %call.call_id,
                    error = %e,
                    "Tool call failed"
                );
                ToolCallResult::failed(&call, e.to_string())
            }
        };

        if def.origin.is_external() {
            let record = AuditRecord {
                workspace_id: ctx.workspace_id.clone(),
                member_id: ctx.member_id.clone(),
                user_id: Some(ctx.user_id.clone()),
                tool_name: call.tool_name.clone(),
                toolkit: def.origin.app().map(ToString::to_string),
                arguments_snapshot: args,
                outcome: if result.success { "success" } else { "error" }.to_string(),
                error: result.error.clone(),
                execution_path: path,
                tool_call_id: Some(call.call_id.clone()),
                timestamp: Utc::now(),
            };
            self.audit.record(record).await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditSink, MemoryAuditSink};
    use crate::intent::Intent;
    use crate::tools::testing::{external_def, internal_def};
    use crate::tools::{ContextRequirements, ToolDefinition, ToolExecutor, ToolOrigin};
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Debug)]
    struct FailingExecutor;

    #[async_trait]
    impl ToolExecutor for FailingExecutor {
        async fn call(&self, _args: Value) -> anyhow::Result<Value> {
            anyhow::bail!("service unavailable")
        }
    }

    fn failing_external(name: &str, app: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
            origin: ToolOrigin::External {
                app: app.to_string(),
            },
            context: ContextRequirements::default(),
            executor: Arc::new(FailingExecutor),
        }
    }

    fn call(tool: &str, id: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: id.to_string(),
            tool_name: tool.to_string(),
            arguments: serde_json::Map::new(),
        }
    }

    fn setup() -> (ToolCallExecutor, Arc<MemoryAuditSink>, RequestContext) {
        let sink = Arc::new(MemoryAuditSink::new());
        let executor = ToolCallExecutor::new(
            AuditLogger::new(Arc::clone(&sink) as Arc<dyn AuditSink>),
            DEFAULT_TOOL_CONCURRENCY,
        );
        let ctx = RequestContext::for_tests("ws-1", "u-1", Intent::internal("test"));
        (executor, sink, ctx)
    }

    #[tokio::test]
    async fn test_sibling_calls_survive_a_failure() {
        let (executor, _sink, ctx) = setup();
        let mut tools = ToolSet::new();
        tools.insert(external_def("slack_post_message", "slack"));
        tools.insert(failing_external("gmail_send_email", "gmail"));

        let results = executor
            .execute(
                vec![call("gmail_send_email", "c1"), call("slack_post_message", "c2")],
                &tools,
                &ctx,
                ExecutionPath::Rich,
            )
            .await;

        assert_eq!(results.len(), 2);
        let by_id = |id: &str| results.iter().find(|r| r.call_id == id).unwrap();
        assert!(!by_id("c1").success);
        assert!(by_id("c1").error.as_deref().unwrap().contains("service unavailable"));
        assert!(by_id("c2").success);
    }

    #[tokio::test]
    async fn test_every_external_call_is_audited() {
        let (executor, sink, ctx) = setup();
        let mut tools = ToolSet::new();
        tools.insert(external_def("slack_post_message", "slack"));
        tools.insert(failing_external("gmail_send_email", "gmail"));
        tools.insert(internal_def("tasks_due"));

        let results = executor
            .execute(
                vec![
                    call("slack_post_message", "c1"),
                    call("gmail_send_email", "c2"),
                    call("tasks_due", "c3"),
                ],
                &tools,
                &ctx,
                ExecutionPath::Rich,
            )
            .await;
        assert_eq!(results.len(), 3);

        // Exactly one record per external attempt; internal reads are not
        // audited.
        let records = sink.records().await;
        assert_eq!(records.len(), 2);

        for record in &records {
            let result = results
                .iter()
                .find(|r| r.call_id == record.tool_call_id.clone().unwrap())
                .unwrap();
            let expected = if result.success { "success" } else { "error" };
            assert_eq!(record.outcome, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result_not_panic() {
        let (executor, sink, ctx) = setup();
        let tools = ToolSet::new();

        let results = executor
            .execute(
                vec![call("nonexistent_tool", "c1")],
                &tools,
                &ctx,
                ExecutionPath::InternalOnly,
            )
            .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(sink.len().await, 0);
    }

    #[tokio::test]
    async fn test_results_correlate_by_call_id() {
        let (executor, _sink, ctx) = setup();
        let mut tools = ToolSet::new();
        tools.insert(external_def("slack_post_message", "slack"));

        let calls: Vec<ToolCallRequest> = (0..8)
            .map(|i| call("slack_post_message", &format!("c{i}")))
            .collect();
        let ids: Vec<String> = calls.iter().map(|c| c.call_id.clone()).collect();

        let results = executor
            .execute(calls, &tools, &ctx, ExecutionPath::Rich)
            .await;

        assert_eq!(results.len(), 8);
        let result_ids: Vec<String> = results.iter().map(|r| r.call_id.clone()).collect();
        assert_eq!(result_ids, ids);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (executor, sink, ctx) = setup();
        let results = executor
            .execute(Vec::new(), &ToolSet::new(), &ctx, ExecutionPath::Rich)
            .await;
        assert!(results.is_empty());
        assert_eq!(sink.len().await, 0);
    }
}
