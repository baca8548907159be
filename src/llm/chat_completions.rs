//! OpenAI Chat Completions API client.
//!
//! Implements [`LlmClient`] against `/v1/chat/completions`. The pipeline is
//! request/response shaped (one envelope per HTTP request), so this client
//! is non-streaming: it sends the full message set and reads back one
//! assistant turn, including any tool calls.

use std::time::Duration;

use anyhow::Context;

use super::{LlmClient, LlmRequest, LlmSettings, LlmTurn, WireToolCall};

/// Client for OpenAI-compatible Chat Completions endpoints.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { http, settings }
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmTurn> {
        let url = self
            .settings
            .provider
            .build_chat_url(&self.settings.base_url, &self.settings.model);

        let body = serde_json::json!({
            "model": self.settings.model,
            "stream": false,
            "messages": req.messages,
            "tools": if req.tools.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Array(req.tools)
            }
        });

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb
            .send()
            .await
            .context("chat completions request failed")?
            .error_for_status()
            .context("chat completions returned an error status")?;

        let v: serde_json::Value = resp
            .json()
            .await
            .context("chat completions response was not valid JSON")?;

        let message = &v["choices"][0]["message"];
        if message.is_null() {
            anyhow::bail!("chat completions response had no choices");
        }

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(|tc| tc.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        serde_json::from_value::<WireToolCall>(tc.clone())
                            .map_err(|e| {
                                tracing::warn!(error = %e, "Skipping malformed tool call in model response");
                            })
                            .ok()
                    })
                    .map(WireToolCall::into_request)
                    .collect()
            })
            .unwrap_or_default();

        Ok(LlmTurn { text, tool_calls })
    }
}
