//! The unified response contract.
//!
//! [`ResponseEnvelope`] is the single externally-visible response shape.
//! Both execution paths (rich and internal-only) must populate every
//! field, using empty defaults rather than omitting them, so a client can
//! never tell which path served the request from the schema alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intent::Intent;

/// Schema version stamped into every response.
pub const SCHEMA_VERSION: &str = "v1";

/// Assistant type reported in the envelope.
pub const ASSISTANT_TYPE: &str = "workspace";

/// Which execution path served the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    Rich,
    InternalOnly,
}

/// A source reference attached to an answer (document, message, page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// An action the assistant performed (or proposed) during this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// "executed", "failed", or "pending_confirmation".
    pub status: String,
}

/// Tool-availability metadata for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsMetadata {
    pub internal_enabled: bool,
    pub external_enabled: bool,
    pub external_used: bool,
    pub connected_apps: Vec<String>,
}

/// Fallback metadata for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMetadata {
    pub attempted: bool,
    pub reason: Option<String>,
}

/// Response metadata, identical in shape for both paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub schema_version: String,
    pub assistant_type: String,
    pub execution_path: ExecutionPath,
    pub intent: Intent,
    pub tools: ToolsMetadata,
    pub fallback: FallbackMetadata,
}

/// The single externally-visible response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    pub response: String,
    pub sources: Vec<Source>,
    pub actions: Vec<Action>,
    pub tool_results: Vec<Value>,
    pub assistant_type: String,
    pub composio_tools_used: bool,
    pub connected_apps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub metadata: ResponseMetadata,
}

/// Incrementally builds an envelope so both paths share one construction
/// site and cannot drift apart in shape.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    success: bool,
    response: String,
    sources: Vec<Source>,
    actions: Vec<Action>,
    tool_results: Vec<Value>,
    composio_tools_used: bool,
    connected_apps: Vec<String>,
    error_code: Option<String>,
    execution_path: ExecutionPath,
    intent: Intent,
    tools: ToolsMetadata,
    fallback: FallbackMetadata,
}

impl EnvelopeBuilder {
    #[must_use]
    pub fn new(execution_path: ExecutionPath, intent: Intent) -> Self {
        Self {
            success: true,
            response: String::new(),
            sources: Vec::new(),
            actions: Vec::new(),
            tool_results: Vec::new(),
            composio_tools_used: false,
            connected_apps: Vec::new(),
            error_code: None,
            execution_path,
            intent,
            tools: ToolsMetadata {
                internal_enabled: true,
                ..ToolsMetadata::default()
            },
            fallback: FallbackMetadata::default(),
        }
    }

    #[must_use]
    pub fn response(mut self, text: impl Into<String>) -> Self {
        self.response = text.into();
        self
    }

    #[must_use]
    pub fn sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn tool_results(mut self, results: Vec<Value>) -> Self {
        self.tool_results = results;
        self
    }

    #[must_use]
    pub fn external_tools(mut self, enabled: bool, used: bool, connected_apps: Vec<String>) -> Self {
        self.tools.external_enabled = enabled;
        self.tools.external_used = used;
        self.composio_tools_used = used;
        self.tools.connected_apps.clone_from(&connected_apps);
        self.connected_apps = connected_apps;
        self
    }

    #[must_use]
    pub fn fallback(mut self, attempted: bool, reason: Option<String>) -> Self {
        self.fallback = FallbackMetadata { attempted, reason };
        self
    }

    #[must_use]
    pub fn failure(mut self, code: impl Into<String>) -> Self {
        self.success = false;
        self.error_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ResponseEnvelope {
        ResponseEnvelope {
            success: self.success,
            response: self.response,
            sources: self.sources,
            actions: self.actions,
            tool_results: self.tool_results,
            assistant_type: ASSISTANT_TYPE.to_string(),
            composio_tools_used: self.composio_tools_used,
            connected_apps: self.connected_apps,
            error_code: self.error_code,
            metadata: ResponseMetadata {
                schema_version: SCHEMA_VERSION.to_string(),
                assistant_type: ASSISTANT_TYPE.to_string(),
                execution_path: self.execution_path,
                intent: self.intent,
                tools: self.tools,
                fallback: self.fallback,
            },
        }
    }
}
