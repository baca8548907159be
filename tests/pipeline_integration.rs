//! End-to-end pipeline scenarios driven through the controller with
//! scripted collaborators. No network, no live model.

mod common;

use common::{harness, tool_spec};
use serde_json::json;

use workspace_assistant::envelope::ExecutionPath;
use workspace_assistant::intent::IntentMode;
use workspace_assistant::pipeline::controller::AssistantRequest;

fn request(message: &str) -> AssistantRequest {
    AssistantRequest {
        workspace_id: "ws-1".to_string(),
        member_id: Some("m-1".to_string()),
        user_id: "u-1".to_string(),
        workspace_context: None,
        message: message.to_string(),
        history: Vec::new(),
    }
}

// Scenario A: external request with no active connection must not
// fabricate an action.
#[tokio::test]
async fn test_send_email_without_connection_explains_no_connection() {
    let h = harness(false);

    let envelope = h
        .state
        .controller
        .handle(request("send an email to alice@example.com saying hi"))
        .await;

    assert!(envelope.success);
    assert!(!envelope.metadata.tools.external_enabled);
    assert!(!envelope.composio_tools_used);
    let lower = envelope.response.to_lowercase();
    assert!(
        lower.contains("no active connection"),
        "response should explain the missing connection: {}",
        envelope.response
    );

    // No model turn ran, so nothing could fabricate an email being sent.
    assert!(h.llm.requests().is_empty());
    assert_eq!(h.audit.len().await, 0);
}

// Scenario B: internal question assembles internal tools only.
#[tokio::test]
async fn test_tasks_question_stays_internal() {
    let h = harness(false);
    h.llm
        .push_tool_call("call_1", "tasks_due", json!({ "due": "today" }));
    h.llm.push_text("You have no tasks due today.");

    let envelope = h
        .state
        .controller
        .handle(request("what are my tasks due today"))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.metadata.intent.mode, IntentMode::Internal);
    assert_eq!(envelope.metadata.execution_path, ExecutionPath::InternalOnly);
    assert!(!envelope.metadata.tools.external_enabled);
    assert_eq!(envelope.tool_results.len(), 1);

    // The model only ever saw internal tool schemas.
    let first_request = &h.llm.requests()[0];
    for tool in &first_request.tools {
        let name = tool["function"]["name"].as_str().unwrap();
        assert!(
            ["tasks_due", "document_search", "member_lookup", "workspace_summary"]
                .contains(&name),
            "unexpected tool offered: {name}"
        );
    }
}

// Scenario C: high-impact external action gates instead of executing.
#[tokio::test]
async fn test_slack_delete_requires_confirmation() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_delete_channel", "slack")],
        )
        .await;
    h.llm.push_tool_call(
        "call_del",
        "slack_delete_channel",
        json!({ "channel": "#general" }),
    );

    let envelope = h
        .state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;

    assert!(envelope.success);
    let lower = envelope.response.to_lowercase();
    assert!(lower.contains("yes") && lower.contains("cancel") || lower.contains("no"));
    assert!(envelope.tool_results.is_empty());
    assert!(!envelope.metadata.tools.external_used);
    assert_eq!(envelope.actions.len(), 1);
    assert_eq!(envelope.actions[0].status, "pending_confirmation");

    // Nothing executed, nothing audited.
    assert!(h.connector.invocations().await.is_empty());
    assert_eq!(h.audit.len().await, 0);
}

// Scenario D: "yes" executes the original call and audits it once.
#[tokio::test]
async fn test_confirmation_yes_executes_original_call() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_delete_channel", "slack")],
        )
        .await;
    h.llm.push_tool_call(
        "call_del",
        "slack_delete_channel",
        json!({ "channel": "#general" }),
    );

    let prompt = h
        .state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;
    assert!(prompt.tool_results.is_empty());

    let envelope = h.state.controller.handle(request("yes")).await;

    assert!(envelope.success);
    assert_eq!(envelope.tool_results.len(), 1);
    assert!(envelope.metadata.tools.external_used);

    // The original call ran, with the original arguments.
    let invocations = h.connector.invocations().await;
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].0, "slack_delete_channel");
    assert_eq!(invocations[0].1["channel"], "#general");

    // Exactly one audit record whose outcome matches the result.
    let records = h.audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tool_name, "slack_delete_channel");
    assert_eq!(records[0].outcome, "success");
    assert_eq!(records[0].tool_call_id.as_deref(), Some("call_del"));
}

// Scenario D variant: the confirmed call fails and the audit outcome says so.
#[tokio::test]
async fn test_confirmed_failure_is_audited_as_error() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_delete_channel", "slack")],
        )
        .await;
    h.connector.fail_tool("slack_delete_channel").await;
    h.llm
        .push_tool_call("call_del", "slack_delete_channel", json!({}));

    h.state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;
    let envelope = h.state.controller.handle(request("yes")).await;

    assert!(envelope.success, "per-call failure must not fail the request");
    let records = h.audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, "error");
    assert!(records[0].error.is_some());
}

// Re-sending the original request while the gate is open never executes
// the action twice (idempotence of the unconfirmed state).
#[tokio::test]
async fn test_unconfirmed_action_never_executes() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_delete_channel", "slack")],
        )
        .await;
    h.llm
        .push_tool_call("call_del", "slack_delete_channel", json!({}));

    h.state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;

    // Same utterance again: parsed as an unclear decision, re-prompted.
    let envelope = h
        .state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;
    assert!(envelope.response.to_lowercase().contains("yes or no"));

    // And an explicitly ambiguous reply keeps it parked as well.
    let envelope = h.state.controller.handle(request("hmm maybe")).await;
    assert!(envelope.tool_results.is_empty());

    assert!(h.connector.invocations().await.is_empty());
    assert_eq!(h.audit.len().await, 0);
}

#[tokio::test]
async fn test_confirmation_no_cancels() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_delete_channel", "slack")],
        )
        .await;
    h.llm
        .push_tool_call("call_del", "slack_delete_channel", json!({}));

    h.state
        .controller
        .handle(request("delete the #general channel in slack"))
        .await;
    let envelope = h.state.controller.handle(request("no")).await;

    assert!(envelope.response.to_lowercase().contains("cancel"));
    assert!(h.connector.invocations().await.is_empty());
    assert_eq!(h.audit.len().await, 0);

    // The gate is closed now; a later "yes" is just a normal message.
    let envelope = h.state.controller.handle(request("yes")).await;
    assert!(envelope.metadata.intent.mode == IntentMode::Internal);
    assert!(h.connector.invocations().await.is_empty());
}

// Scenario E: rich-path model failure falls back to the internal path.
#[tokio::test]
async fn test_rich_path_failure_falls_back_internal() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_list_channels", "slack")],
        )
        .await;
    h.llm.push_error("model endpoint exploded");
    h.llm
        .push_text("I can answer from workspace data only right now.");

    let envelope = h
        .state
        .controller
        .handle(request("summarize the slack channel activity"))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.metadata.execution_path, ExecutionPath::InternalOnly);
    assert!(envelope.metadata.fallback.attempted);
    assert!(envelope.metadata.fallback.reason.is_some());
    assert!(!envelope.metadata.tools.external_enabled);
}

// Both paths failing yields a structured error, never a panic or raw error.
#[tokio::test]
async fn test_both_paths_failing_returns_structured_error() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_list_channels", "slack")],
        )
        .await;
    h.llm.push_error("model endpoint exploded");
    h.llm.push_error("model endpoint still exploded");

    let envelope = h
        .state
        .controller
        .handle(request("summarize the slack channel activity"))
        .await;

    assert!(!envelope.success);
    assert_eq!(
        envelope.error_code.as_deref(),
        Some("model_invocation_failed")
    );
    assert!(envelope.metadata.fallback.attempted);
    // Raw collaborator detail must not leak into the response text.
    assert!(!envelope.response.contains("exploded"));
}

// Partial failure: one failing call does not abort its sibling.
#[tokio::test]
async fn test_partial_tool_failure_tolerated() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![
                tool_spec("slack_list_channels", "slack"),
                tool_spec("slack_search_messages", "slack"),
            ],
        )
        .await;
    h.connector.fail_tool("slack_search_messages").await;

    // One model turn proposing two read calls at once.
    let turn_calls = vec![
        ("call_a", "slack_list_channels"),
        ("call_b", "slack_search_messages"),
    ];
    // push a single scripted turn with both calls
    {
        use workspace_assistant::tools::ToolCallRequest;
        let calls = turn_calls
            .iter()
            .map(|(id, tool)| ToolCallRequest {
                call_id: (*id).to_string(),
                tool_name: (*tool).to_string(),
                arguments: serde_json::Map::new(),
            })
            .collect::<Vec<_>>();
        h.llm.push_turn_with_calls(calls);
    }
    h.llm.push_text("Here is what I could fetch.");

    let envelope = h
        .state
        .controller
        .handle(request("what happened in slack today"))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.tool_results.len(), 2);

    let results = &envelope.tool_results;
    let by_id = |id: &str| {
        results
            .iter()
            .find(|r| r["callId"] == id)
            .unwrap_or_else(|| panic!("missing result {id}"))
    };
    assert_eq!(by_id("call_a")["success"], true);
    assert_eq!(by_id("call_b")["success"], false);

    // Both external attempts audited, matching outcomes.
    let records = h.audit.records().await;
    assert_eq!(records.len(), 2);
    let audit_by_call = |id: &str| {
        records
            .iter()
            .find(|r| r.tool_call_id.as_deref() == Some(id))
            .unwrap()
    };
    assert_eq!(audit_by_call("call_a").outcome, "success");
    assert_eq!(audit_by_call("call_b").outcome, "error");
}

// A failing follow-up turn still returns the partial tool summary.
#[tokio::test]
async fn test_followup_turn_failure_returns_partial_summary() {
    let h = harness(false);
    h.connector
        .connect_app(
            "ws-1:m-1",
            "slack",
            vec![tool_spec("slack_list_channels", "slack")],
        )
        .await;
    h.llm
        .push_tool_call("call_a", "slack_list_channels", json!({}));
    h.llm.push_error("second turn failed");

    let envelope = h
        .state
        .controller
        .handle(request("list slack channels"))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.tool_results.len(), 1);
    assert!(envelope.response.contains("1 succeeded"));
}
