//! Contract tests: both execution paths must emit envelopes with an
//! identical schema, so a client can never tell which path served it.

mod common;

use common::{harness, tool_spec};
use serde_json::{Value, json};

use workspace_assistant::envelope::ExecutionPath;
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

/// Collect the full key tree of a JSON object (maps only; array element
/// shapes vary with content and are not part of the schema contract).
fn key_tree(value: &Value, prefix: &str, keys: &mut Vec<String>) {
    if let Value::Object(map) = value {
        for (k, v) in map {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if !matches!(v, Value::Array(_)) {
                key_tree(v, &path, keys);
            }
        }
    }
}

fn envelope_keys(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    key_tree(value, "", &mut keys);
    // `intent.requestedApps` content differs per request; drop volatile
    // leaf values but keep the key names, which is what the contract fixes.
    keys.sort();
    keys
}

#[tokio::test]
async fn test_rich_and_internal_envelopes_share_schema() {
    // Rich path: external read via connected slack.
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
    h.llm.push_text("Two channels: #general and #random.");

    let rich = h
        .state
        .controller
        .handle(request("list my slack channels"))
        .await;
    assert_eq!(rich.metadata.execution_path, ExecutionPath::Rich);

    // Internal path: plain workspace question on a fresh harness.
    let h2 = harness(false);
    h2.llm.push_text("Nothing due today.");
    let internal = h2
        .state
        .controller
        .handle(request("what are my tasks due today"))
        .await;

    let rich_json = serde_json::to_value(&rich).unwrap();
    let internal_json = serde_json::to_value(&internal).unwrap();

    assert_eq!(
        envelope_keys(&rich_json),
        envelope_keys(&internal_json),
        "rich and internal envelopes must have identical key sets"
    );

    // Spot-check the fixed fields on both.
    for envelope in [&rich_json, &internal_json] {
        assert_eq!(envelope["metadata"]["schemaVersion"], "v1");
        assert_eq!(envelope["assistantType"], "workspace");
        assert!(envelope["toolResults"].is_array());
        assert!(envelope["connectedApps"].is_array());
        assert!(envelope["metadata"]["fallback"]["attempted"].is_boolean());
    }
}

#[tokio::test]
async fn test_error_envelope_shares_schema_too() {
    let h = harness(false);
    h.llm.push_error("down");
    let failed = h
        .state
        .controller
        .handle(request("what are my tasks due today"))
        .await;
    assert!(!failed.success);

    let h2 = harness(false);
    h2.llm.push_text("All good.");
    let ok = h2
        .state
        .controller
        .handle(request("what are my tasks due today"))
        .await;

    let mut failed_json = serde_json::to_value(&failed).unwrap();
    let ok_json = serde_json::to_value(&ok).unwrap();

    // The error envelope adds `errorCode` but must otherwise match.
    failed_json.as_object_mut().unwrap().remove("errorCode");
    assert_eq!(envelope_keys(&failed_json), envelope_keys(&ok_json));
}

#[tokio::test]
async fn test_envelope_round_trip() {
    let h = harness(false);
    h.llm.push_text("Hello.");
    let envelope = h.state.controller.handle(request("hello")).await;

    let json = serde_json::to_string(&envelope).unwrap();
    let parsed: workspace_assistant::envelope::ResponseEnvelope =
        serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.metadata.schema_version, "v1");
    assert_eq!(parsed.response, envelope.response);
    assert_eq!(parsed.success, envelope.success);
}
