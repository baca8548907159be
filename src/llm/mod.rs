//! Language-model client boundary.
//!
//! The pipeline treats the model as a capability: it accepts a system
//! prompt, message history, and tool schemas, and returns text plus zero or
//! more tool-call requests. [`LlmClient`] is the seam; the concrete
//! implementation speaks the OpenAI Chat Completions wire format
//! ([`ChatCompletionsClient`]). The orchestration code never depends on a
//! specific provider.

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsClient;
pub use provider::Provider;

use serde::{Deserialize, Serialize};

use crate::tools::ToolCallRequest;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` if not specified).
    pub provider: Provider,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set on tool-result messages to correlate with the originating call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on assistant messages that requested tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Assistant message carrying the tool calls the model requested.
    #[must_use]
    pub fn assistant_tool_calls(content: impl Into<String>, calls: &[ToolCallRequest]) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(calls.iter().map(WireToolCall::from_request).collect()),
        }
    }

    /// Tool-result message fed back for the follow-up turn.
    #[must_use]
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }
}

/// Tool call in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: WireToolCallFunction,
}

/// Function details in a wire tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToolCallFunction {
    pub name: String,
    /// Arguments as a JSON string, per the wire format.
    pub arguments: String,
}

impl WireToolCall {
    #[must_use]
    pub fn from_request(call: &ToolCallRequest) -> Self {
        Self {
            id: call.call_id.clone(),
            call_type: "function".to_string(),
            function: WireToolCallFunction {
                name: call.tool_name.clone(),
                arguments: serde_json::Value::Object(call.arguments.clone()).to_string(),
            },
        }
    }

    /// Parse back into a pipeline request. Malformed argument JSON degrades
    /// to an empty argument map rather than failing the turn.
    #[must_use]
    pub fn into_request(self) -> ToolCallRequest {
        let arguments = serde_json::from_str::<serde_json::Value>(&self.function.arguments)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        ToolCallRequest {
            call_id: self.id,
            tool_name: self.function.name,
            arguments,
        }
    }
}

/// Request to an LLM client.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Available tools in OpenAI function schema format.
    pub tools: Vec<serde_json::Value>,
}

/// One completed (non-streaming) model turn.
#[derive(Debug, Clone, Default)]
pub struct LlmTurn {
    /// Assistant text, possibly empty when the turn is tool-calls only.
    pub text: String,
    /// Tool calls the model wants executed, in request order.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Trait for LLM clients.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Run one model turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response
    /// cannot be parsed.
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmTurn>;
}
