//! Shared rendering of tool results into envelope fields.
//!
//! Both execution paths go through these helpers so sources, actions, and
//! partial-failure summaries cannot drift apart in shape between them.

use serde_json::Value;

use crate::envelope::{Action, Source};
use crate::tools::{ToolCallResult, ToolSet};

/// Serialize results for the envelope's `toolResults` field.
#[must_use]
pub fn results_to_values(results: &[ToolCallResult]) -> Vec<Value> {
    results
        .iter()
        .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
        .collect()
}

/// Pull source references out of successful tool payloads.
///
/// Internal document search returns `{ "documents": [{title, url, snippet}] }`;
/// anything else shaped like a titled link is picked up as well.
#[must_use]
pub fn extract_sources(results: &[ToolCallResult]) -> Vec<Source> {
    let mut sources = Vec::new();
    for result in results.iter().filter(|r| r.success) {
        let Some(payload) = &result.payload else {
            continue;
        };
        if let Some(docs) = payload.get("documents").and_then(Value::as_array) {
            for doc in docs {
                if let Some(title) = doc.get("title").and_then(Value::as_str) {
                    sources.push(Source {
                        title: title.to_string(),
                        url: doc.get("url").and_then(Value::as_str).map(String::from),
                        snippet: doc
                            .get("snippet")
                            .and_then(Value::as_str)
                            .map(String::from),
                    });
                }
            }
        }
    }
    sources
}

/// One action entry per external call in the batch, with its outcome.
#[must_use]
pub fn build_actions(results: &[ToolCallResult], tools: &ToolSet) -> Vec<Action> {
    results
        .iter()
        .filter_map(|r| {
            let def = tools.get(&r.tool_name)?;
            if !def.origin.is_external() {
                return None;
            }
            Some(Action {
                tool: r.tool_name.clone(),
                app: def.origin.app().map(String::from),
                status: if r.success { "executed" } else { "failed" }.to_string(),
            })
        })
        .collect()
}

/// True when any external call in the batch was dispatched.
#[must_use]
pub fn external_used(results: &[ToolCallResult], tools: &ToolSet) -> bool {
    results
        .iter()
        .any(|r| tools.get(&r.tool_name).is_some_and(|d| d.origin.is_external()))
}

/// Fallback answer when the follow-up model turn fails: a plain summary of
/// what ran, so the user still sees the partial outcome instead of an error.
#[must_use]
pub fn partial_results_summary(results: &[ToolCallResult]) -> String {
    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;

    let mut lines = vec![format!(
        "I ran {} operation(s): {succeeded} succeeded, {failed} failed.",
        results.len()
    )];
    for result in results {
        if result.success {
            lines.push(format!("- {}: completed", result.tool_name));
        } else {
            lines.push(format!(
                "- {}: could not be completed",
                result.tool_name
            ));
        }
    }
    if failed > 0 {
        lines.push("Some operations could not be completed. You can retry them.".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCallRequest;
    use crate::tools::testing::{external_def, internal_def};

    fn result(tool: &str, id: &str, success: bool, payload: Value) -> ToolCallResult {
        let call = ToolCallRequest {
            call_id: id.to_string(),
            tool_name: tool.to_string(),
            arguments: serde_json::Map::new(),
        };
        if success {
            ToolCallResult::ok(&call, payload)
        } else {
            ToolCallResult::failed(&call, "boom")
        }
    }

    #[test]
    fn test_sources_from_document_payload() {
        let results = vec![result(
            "document_search",
            "c1",
            true,
            serde_json::json!({
                "documents": [
                    { "title": "Q3 Plan", "url": "https://w/doc/1", "snippet": "goals" },
                    { "title": "Notes" }
                ]
            }),
        )];

        let sources = extract_sources(&results);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Q3 Plan");
        assert_eq!(sources[0].url.as_deref(), Some("https://w/doc/1"));
        assert!(sources[1].url.is_none());
    }

    #[test]
    fn test_failed_results_produce_no_sources() {
        let results = vec![result("document_search", "c1", false, Value::Null)];
        assert!(extract_sources(&results).is_empty());
    }

    #[test]
    fn test_actions_external_only() {
        let mut tools = ToolSet::new();
        tools.insert(internal_def("tasks_due"));
        tools.insert(external_def("gmail_send_email", "gmail"));

        let results = vec![
            result("tasks_due", "c1", true, serde_json::json!({})),
            result("gmail_send_email", "c2", false, Value::Null),
        ];

        let actions = build_actions(&results, &tools);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].tool, "gmail_send_email");
        assert_eq!(actions[0].status, "failed");
        assert!(external_used(&results, &tools));
    }

    #[test]
    fn test_partial_summary_counts() {
        let results = vec![
            result("a", "c1", true, serde_json::json!({})),
            result("b", "c2", false, Value::Null),
        ];
        let summary = partial_results_summary(&results);
        assert!(summary.contains("1 succeeded, 1 failed"));
        assert!(summary.contains("could not be completed"));
    }
}
