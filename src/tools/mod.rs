//! Tool definitions shared by the internal registry and the external
//! resolver.
//!
//! Every capability the model can call is a [`ToolDefinition`]: a unique
//! name, a JSON-schema parameter description, an explicit
//! [`ToolOrigin`] discriminant, and a closed [`ToolExecutor`] behind it.
//! Dispatch always goes through an explicit name-keyed map ([`ToolSet`]),
//! never through reflection.

pub mod assembler;
pub mod external;
pub mod internal;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a tool's implementation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum ToolOrigin {
    /// Backed by the workspace's own data store; never crosses a trust
    /// boundary.
    Internal,
    /// Invokes a connected third-party service on the user's behalf.
    External { app: String },
}

impl ToolOrigin {
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }

    /// The connected app behind an external tool, if any.
    #[must_use]
    pub fn app(&self) -> Option<&str> {
        match self {
            Self::Internal => None,
            Self::External { app } => Some(app),
        }
    }
}

/// Context fields a tool needs injected at call time.
///
/// Injection is the assembler's job; these values are never accepted from
/// model-controlled arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextRequirements {
    pub needs_workspace_id: bool,
    pub needs_user_id: bool,
}

/// Executable body of a tool.
#[async_trait]
pub trait ToolExecutor: Send + Sync + std::fmt::Debug {
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

/// A callable capability scoped to the current request.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Unique within one assembled tool set.
    pub name: String,
    pub description: String,
    /// JSON-schema-like parameter description in OpenAI function format.
    pub parameters: Value,
    pub origin: ToolOrigin,
    pub context: ContextRequirements,
    pub executor: Arc<dyn ToolExecutor>,
}

impl ToolDefinition {
    /// Render this definition as an OpenAI function-tool schema entry.
    #[must_use]
    pub fn function_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A tool call the model wants to make. Ephemeral: produced by one model
/// turn, consumed by the confirmation gate and the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Unique within one model turn.
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, Value>,
}

/// Outcome of one tool call, correlated to its request by `call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    #[must_use]
    pub fn ok(call: &ToolCallRequest, payload: Value) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(call: &ToolCallRequest, error: impl Into<String>) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// The flat, name-keyed set of tools assembled for one request.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, returning the displaced one on name collision.
    pub fn insert(&mut self, def: ToolDefinition) -> Option<ToolDefinition> {
        self.tools.insert(def.name.clone(), def)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// All definitions rendered as OpenAI function-tool schemas.
    #[must_use]
    pub fn function_schemas(&self) -> Vec<Value> {
        self.tools.values().map(ToolDefinition::function_schema).collect()
    }

    /// True if any definition in the set is external.
    #[must_use]
    pub fn has_external(&self) -> bool {
        self.tools.values().any(|d| d.origin.is_external())
    }
}
