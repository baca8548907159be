//! The confirmation gate.
//!
//! Inspects the tool calls a model turn proposes *before* anything
//! executes. High-impact external actions (sends, deletes, mutations
//! visible to a third party) interrupt the pipeline and require an
//! explicit user decision on the next turn. Pure reads never gate.

use serde::{Deserialize, Serialize};

use crate::tools::{ToolCallRequest, ToolSet};

/// Gate states. `Confirmed`-then-executed and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    NoGate,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
}

/// The user's decision, parsed from their next utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Confirm,
    Cancel,
    Unclear,
}

/// Risk analysis of one turn's proposed calls.
#[derive(Debug, Clone)]
pub struct ConfirmationAnalysis {
    pub requires_confirmation: bool,
    pub risk_summary: String,
    /// The calls that triggered the gate.
    pub affected_actions: Vec<ToolCallRequest>,
}

/// Verb fragments that mark an external action as high-impact.
///
/// Matching is on the tool name, which connector services derive from the
/// operation (e.g. `gmail_send_email`, `slack_delete_channel`).
const HIGH_IMPACT_VERBS: &[&str] = &[
    "send",
    "delete",
    "remove",
    "create",
    "update",
    "archive",
    "post",
    "reply",
    "move",
    "revoke",
    "invite",
    "share",
];

/// Decide whether any proposed call needs explicit confirmation.
///
/// A call gates iff its tool is external and its name carries a mutating
/// verb. Internal tools are read-only lookups and never gate; unknown tool
/// names are left for the executor to reject.
#[must_use]
pub fn analyze(calls: &[ToolCallRequest], tools: &ToolSet) -> ConfirmationAnalysis {
    let affected: Vec<ToolCallRequest> = calls
        .iter()
        .filter(|call| {
            tools
                .get(&call.tool_name)
                .is_some_and(|def| def.origin.is_external() && is_high_impact(&call.tool_name))
        })
        .cloned()
        .collect();

    if affected.is_empty() {
        return ConfirmationAnalysis {
            requires_confirmation: false,
            risk_summary: String::new(),
            affected_actions: Vec::new(),
        };
    }

    let risk_summary = summarize_actions(&affected, tools);
    ConfirmationAnalysis {
        requires_confirmation: true,
        risk_summary,
        affected_actions: affected,
    }
}

fn is_high_impact(tool_name: &str) -> bool {
    let lower = tool_name.to_lowercase();
    HIGH_IMPACT_VERBS.iter().any(|verb| lower.contains(verb))
}

/// Human-readable description of what would run, for the confirmation
/// prompt.
#[must_use]
pub fn summarize_actions(calls: &[ToolCallRequest], tools: &ToolSet) -> String {
    let mut lines = Vec::new();
    for call in calls {
        let app = tools
            .get(&call.tool_name)
            .and_then(|def| def.origin.app())
            .unwrap_or("a connected app");
        let args = serde_json::Value::Object(call.arguments.clone());
        lines.push(format!("- {} via {app}: {args}", call.tool_name));
    }
    lines.join("\n")
}

/// Build the prompt returned while the gate is open.
#[must_use]
pub fn confirmation_prompt(summary: &str) -> String {
    format!(
        "This will perform the following action(s) on your connected apps:\n\
         {summary}\n\n\
         Reply \"yes\" to proceed or \"no\" to cancel."
    )
}

const AFFIRMATIVE: &[&str] = &[
    "yes",
    "y",
    "yep",
    "yeah",
    "sure",
    "ok",
    "okay",
    "confirm",
    "confirmed",
    "go ahead",
    "do it",
    "proceed",
    "please do",
    "sounds good",
];

const NEGATIVE: &[&str] = &[
    "no",
    "n",
    "nope",
    "cancel",
    "stop",
    "don't",
    "do not",
    "abort",
    "never mind",
    "nevermind",
    "forget it",
];

/// Parse the next user turn as a confirm/cancel/unclear decision.
///
/// Deliberately strict: only a clear standalone affirmation or refusal
/// counts. Anything else, including an unrelated request sent while the
/// confirmation is outstanding, is `Unclear` and re-prompts rather than
/// executing or discarding the parked action.
#[must_use]
pub fn parse_decision(utterance: &str) -> ConfirmationDecision {
    let normalized: String = utterance
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!' | '?'))
        .collect();
    let normalized = normalized.trim();

    if normalized.is_empty() {
        return ConfirmationDecision::Unclear;
    }

    if NEGATIVE.contains(&normalized) {
        return ConfirmationDecision::Cancel;
    }
    if AFFIRMATIVE.contains(&normalized) {
        return ConfirmationDecision::Confirm;
    }

    // Short phrases that lead with a clear decision word still count
    // ("yes please", "no thanks").
    let mut words = normalized.split_whitespace();
    let first = words.next().unwrap_or_default();
    let word_count = 1 + words.count();
    if word_count <= 3 {
        if NEGATIVE.contains(&first) {
            return ConfirmationDecision::Cancel;
        }
        if AFFIRMATIVE.contains(&first) {
            return ConfirmationDecision::Confirm;
        }
    }

    ConfirmationDecision::Unclear
}
