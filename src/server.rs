use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::audit::{AuditLogger, AuditSink, JsonlAuditSink};
use crate::config::AppConfig;
use crate::envelope::ResponseEnvelope;
use crate::intent::IntentClassifier;
use crate::llm::{ChatCompletionsClient, ChatMessage, LlmClient, LlmSettings, Role};
use crate::pending::PendingActionStore;
use crate::pipeline::controller::{AssistantController, AssistantRequest};
use crate::pipeline::executor::ToolCallExecutor;
use crate::pipeline::internal_only::InternalOnlyPath;
use crate::pipeline::rich::RichPath;
use crate::security::claims::UserContext;
use crate::security::rate_limit::SimpleRateLimiter;
use crate::tools::external::{
    ConnectorClient, ExternalToolResolver, HttpConnectorClient, StaticConnectorClient,
};
use crate::tools::internal::InternalToolRegistry;
use crate::workspace::{InMemoryWorkspaceStore, WorkspaceStore};

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let llm: Arc<dyn LlmClient> = Arc::new(ChatCompletionsClient::new(settings));

    // Connector: HTTP when configured, otherwise an empty in-memory client
    // so the pipeline degrades to internal-only for every request.
    let connector: Arc<dyn ConnectorClient> = if config.connector.base_url.is_empty() {
        info!("No connector service configured; external tools disabled");
        Arc::new(StaticConnectorClient::new())
    } else {
        Arc::new(HttpConnectorClient::new(
            config.connector.base_url.clone(),
            config.connector.api_key.clone(),
        ))
    };

    let store: Arc<dyn WorkspaceStore> = Arc::new(InMemoryWorkspaceStore::new());
    let audit_sink: Arc<dyn AuditSink> =
        Arc::new(JsonlAuditSink::new(config.audit.log_path.clone()));

    let state = build_state(Arc::clone(&config), llm, connector, store, audit_sink);

    for def in state.controller_internal_tools() {
        info!(name: "tool.registered", tool = %def, "Internal tool registered");
    }

    // Sweep expired pending confirmations in the background.
    let pending = state.controller.pending_store();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = pending.cleanup_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "Expired pending confirmations removed");
            }
        }
    });

    let app = build_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Wire collaborators into shared application state.
#[must_use]
pub fn build_state(
    config: Arc<AppConfig>,
    llm: Arc<dyn LlmClient>,
    connector: Arc<dyn ConnectorClient>,
    store: Arc<dyn WorkspaceStore>,
    audit_sink: Arc<dyn AuditSink>,
) -> AppState {
    let internal = Arc::new(InternalToolRegistry::standard(store));
    let resolver = ExternalToolResolver::new(
        connector,
        Duration::from_secs(config.resilience.connector_timeout_secs),
    );
    let pending = PendingActionStore::new(Duration::from_secs(config.resilience.pending_ttl_secs));
    let executor = ToolCallExecutor::new(
        AuditLogger::new(audit_sink),
        config.resilience.tool_concurrency,
    );

    let rich = Arc::new(RichPath::new(
        Arc::clone(&llm),
        executor.clone(),
        pending.clone(),
    ));
    let internal_only = Arc::new(InternalOnlyPath::new(Arc::clone(&llm), executor.clone()));

    let controller = Arc::new(AssistantController::new(
        IntentClassifier::new(),
        internal,
        resolver,
        pending,
        executor,
        rich,
        internal_only,
    ));

    let rate_limiter = Arc::new(SimpleRateLimiter::new(
        config.resilience.requests_per_second,
        config.resilience.burst_size,
    ));

    AppState {
        controller,
        rate_limiter,
        config,
    }
}

impl AppState {
    /// Names of the registered internal tools, for startup logging.
    #[must_use]
    pub fn controller_internal_tools(&self) -> Vec<String> {
        self.controller.internal_tool_names()
    }
}

/// Build the HTTP router with the full middleware stack.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let timeout_duration = if state.config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60)
    } else {
        Duration::from_secs(60)
    };

    Router::new()
        .route("/api/assistant", post(api_assistant))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::security::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB limit
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::security::rate_limit::rate_limit_middleware,
        ))
        // Liveness stays outside the auth and resilience stack.
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// One history entry as supplied by the client.
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    role: String,
    content: String,
}

/// Request body for the assistant API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssistantApiRequest {
    message: String,
    workspace_id: String,
    #[serde(default)]
    workspace_context: Option<String>,
    #[serde(default)]
    conversation_history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    member_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct ApiError {
    error: String,
}

fn bad_request(msg: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: msg.to_string(),
        }),
    )
}

/// POST /api/assistant - run the orchestration pipeline for one message.
///
/// Always 200 for a handled (even degraded) outcome; 4xx only for
/// malformed or unauthorized requests.
async fn api_assistant(
    State(state): State<AppState>,
    user: Option<Extension<UserContext>>,
    Json(req): Json<AssistantApiRequest>,
) -> Result<Json<ResponseEnvelope>, (StatusCode, Json<ApiError>)> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message is required"));
    }
    if req.workspace_id.trim().is_empty() {
        return Err(bad_request("workspaceId is required"));
    }

    // Authorization checks run before any model invocation.
    if let Some(Extension(user)) = &user {
        if !user.in_workspace(&req.workspace_id) {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ApiError {
                    error: "caller does not belong to the requested workspace".to_string(),
                }),
            ));
        }
        if let Some(member_id) = &req.member_id {
            if !user.owns_member(member_id) {
                return Err((
                    StatusCode::FORBIDDEN,
                    Json(ApiError {
                        error: "caller may not act as the requested member".to_string(),
                    }),
                ));
            }
        }
    }

    let user_id = user
        .as_ref()
        .map(|Extension(u)| u.user_id.clone())
        .or_else(|| req.member_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let history = req
        .conversation_history
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match entry.role.as_str() {
            "user" => Some(ChatMessage::user(entry.content)),
            "assistant" => Some(ChatMessage::assistant(entry.content)),
            // Anything else (including injected "system" entries) is dropped.
            _ => None,
        })
        .collect::<Vec<_>>();
    debug_assert!(history.iter().all(|m| m.role != Role::System));

    tracing::info!(
        workspace_id = %req.workspace_id,
        member_id = ?req.member_id,
        history_len = history.len(),
        "Received assistant request"
    );

    let envelope = state
        .controller
        .handle(AssistantRequest {
            workspace_id: req.workspace_id,
            member_id: req.member_id,
            user_id,
            workspace_context: req.workspace_context,
            message: req.message,
            history,
        })
        .await;

    Ok(Json(envelope))
}
