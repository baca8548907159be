//! Intent classification for inbound utterances.
//!
//! The classifier decides, per request, whether the user is asking about
//! internal workspace data, a connected third-party app, or both. It is
//! keyword-driven and fully deterministic so it can be unit tested with
//! fixed inputs. The output is advisory: downstream stages still verify
//! live connections before exposing any external tool, because a user can
//! name an app without having it connected.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, Role};

/// How the request should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentMode {
    /// Only workspace-internal data is involved.
    Internal,
    /// Only connected third-party apps are involved.
    External,
    /// Both workspace data and third-party apps are involved.
    Hybrid,
}

/// Classified intent for a single request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub mode: IntentMode,
    pub requires_external_tools: bool,
    pub requested_apps: BTreeSet<String>,
    pub reasoning: String,
}

impl Intent {
    /// The default classification: internal mode, no external tools.
    #[must_use]
    pub fn internal(reasoning: impl Into<String>) -> Self {
        Self {
            mode: IntentMode::Internal,
            requires_external_tools: false,
            requested_apps: BTreeSet::new(),
            reasoning: reasoning.into(),
        }
    }
}

/// Keyword patterns per known external application.
///
/// Matching is case-insensitive substring inclusion. Patterns that could
/// collide with ordinary prose carry surrounding context ("slack channel"
/// rather than "channel").
const APP_PATTERNS: &[(&str, &[&str])] = &[
    (
        "gmail",
        &[
            "gmail",
            "my inbox",
            "my email",
            "send an email",
            "send email",
            "mailbox",
        ],
    ),
    (
        "slack",
        &["slack", "dm on slack", "slack channel", "slack message"],
    ),
    (
        "linear",
        &["linear", "linear issue", "linear ticket"],
    ),
    ("notion", &["notion", "notion page", "notion doc"]),
    (
        "github",
        &["github", "pull request", "open pr", "merge request"],
    ),
    (
        "googlecalendar",
        &[
            "google calendar",
            "calendar invite",
            "calendar event",
            "schedule a meeting",
        ],
    ),
    ("jira", &["jira", "jira ticket"]),
];

/// Keywords that indicate the request also touches workspace-internal data.
const INTERNAL_HINTS: &[&str] = &[
    "my task",
    "my tasks",
    "due today",
    "due tomorrow",
    "our doc",
    "workspace",
    "team member",
    "teammate",
    "project status",
];

/// Deterministic, keyword-driven intent classifier.
#[derive(Debug, Default, Clone)]
pub struct IntentClassifier;

impl IntentClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify an utterance, optionally consulting recent history.
    ///
    /// Never panics and never fails: empty or unmatchable input classifies
    /// as internal with no external tools required.
    #[must_use]
    pub fn classify(&self, utterance: &str, history: &[ChatMessage]) -> Intent {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Intent::internal("empty utterance");
        }

        let lower = utterance.to_lowercase();
        let mut requested_apps = match_apps(&lower);

        // Recent user turns can carry the app reference ("and reply to it")
        // so the current utterance alone is not authoritative.
        if requested_apps.is_empty() {
            for msg in history.iter().rev().take(4) {
                if msg.role == Role::User {
                    requested_apps.extend(match_apps(&msg.content.to_lowercase()));
                }
            }
        }

        if requested_apps.is_empty() {
            return Intent::internal("no external application referenced");
        }

        let internal_hint = INTERNAL_HINTS.iter().any(|kw| lower.contains(kw));
        let mode = if internal_hint {
            IntentMode::Hybrid
        } else {
            IntentMode::External
        };

        let apps = requested_apps.iter().cloned().collect::<Vec<_>>().join(", ");
        Intent {
            mode,
            requires_external_tools: true,
            requested_apps,
            reasoning: format!("referenced external apps: {apps}"),
        }
    }
}

fn match_apps(lower: &str) -> BTreeSet<String> {
    let mut apps = BTreeSet::new();
    for (app, patterns) in APP_PATTERNS {
        if patterns.iter().any(|p| lower.contains(p)) {
            apps.insert((*app).to_string());
        }
    }
    apps
}
