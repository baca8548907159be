//! Shared test harness: scripted LLM, seeded collaborators, state wiring.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use workspace_assistant::AppState;
use workspace_assistant::audit::{AuditSink, MemoryAuditSink};
use workspace_assistant::config::AppConfig;
use workspace_assistant::llm::{LlmClient, LlmRequest, LlmTurn};
use workspace_assistant::server::build_state;
use workspace_assistant::tools::ToolCallRequest;
use workspace_assistant::tools::external::{ConnectorClient, ExternalToolSpec, StaticConnectorClient};
use workspace_assistant::workspace::{InMemoryWorkspaceStore, WorkspaceStore};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Text(String),
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
    Error(String),
}

/// LLM double that replays a fixed script and records every request.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.turns
            .lock()
            .unwrap()
            .push_back(ScriptedTurn::Text(text.to_string()));
    }

    pub fn push_tool_call(&self, call_id: &str, tool: &str, args: Value) {
        let arguments = args.as_object().cloned().unwrap_or_default();
        self.turns.lock().unwrap().push_back(ScriptedTurn::ToolCalls {
            text: String::new(),
            calls: vec![ToolCallRequest {
                call_id: call_id.to_string(),
                tool_name: tool.to_string(),
                arguments,
            }],
        });
    }

    /// Push a single turn proposing several tool calls at once.
    pub fn push_turn_with_calls(&self, calls: Vec<ToolCallRequest>) {
        self.turns.lock().unwrap().push_back(ScriptedTurn::ToolCalls {
            text: String::new(),
            calls,
        });
    }

    pub fn push_error(&self, message: &str) {
        self.turns
            .lock()
            .unwrap()
            .push_back(ScriptedTurn::Error(message.to_string()));
    }

    /// Every request the pipeline sent to the model.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmTurn> {
        self.requests.lock().unwrap().push(req);
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(ScriptedTurn::Text(text)) => Ok(LlmTurn {
                text,
                tool_calls: Vec::new(),
            }),
            Some(ScriptedTurn::ToolCalls { text, calls }) => Ok(LlmTurn {
                text,
                tool_calls: calls,
            }),
            Some(ScriptedTurn::Error(message)) => anyhow::bail!(message),
            None => Ok(LlmTurn {
                text: "(unscripted turn)".to_string(),
                tool_calls: Vec::new(),
            }),
        }
    }
}

/// Everything a pipeline test needs to observe.
pub struct Harness {
    pub state: AppState,
    pub llm: Arc<ScriptedLlm>,
    pub connector: Arc<StaticConnectorClient>,
    pub store: Arc<InMemoryWorkspaceStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn test_config(jwt_required: bool) -> Arc<AppConfig> {
    let args = vec![
        "workspace-assistant".to_string(),
        "--jwt-required".to_string(),
        jwt_required.to_string(),
        "--rate-limit-enabled".to_string(),
        "false".to_string(),
    ];
    let mut config = AppConfig::load_from_args(args).expect("test config should load");
    config.security.jwt_secret = "test-secret".to_string();
    Arc::new(config)
}

pub fn harness(jwt_required: bool) -> Harness {
    let llm = Arc::new(ScriptedLlm::new());
    let connector = Arc::new(StaticConnectorClient::new());
    let store = Arc::new(InMemoryWorkspaceStore::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let state = build_state(
        test_config(jwt_required),
        Arc::clone(&llm) as Arc<dyn LlmClient>,
        Arc::clone(&connector) as Arc<dyn ConnectorClient>,
        Arc::clone(&store) as Arc<dyn WorkspaceStore>,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    );

    Harness {
        state,
        llm,
        connector,
        store,
        audit,
    }
}

/// Tool schema helper for scripted connector apps.
pub fn tool_spec(name: &str, app: &str) -> ExternalToolSpec {
    ExternalToolSpec {
        name: name.to_string(),
        description: format!("{app} operation"),
        parameters: serde_json::json!({ "type": "object", "properties": {} }),
        app: app.to_string(),
    }
}
