//! External tool resolution against the connector service.
//!
//! External tools are sourced per-request from whichever third-party
//! applications the caller has active connections to. Resolution is
//! defensive by contract: zero connections is an empty list, an unreachable
//! or hung connector degrades to an empty list with a failure note for the
//! fallback controller, and every connector call carries a hard timeout so
//! a slow third party can never hang the request.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::timeout;
use url::Url;

use super::{ContextRequirements, ToolDefinition, ToolExecutor, ToolOrigin};

/// An active third-party connection for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub app: String,
    pub entity_id: String,
    pub status: String,
}

impl ConnectionInfo {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Tool schema as published by the connector service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub app: String,
}

/// Collaborator interface to the third-party connector service.
///
/// The entity id is always the composite workspace+member identifier,
/// never a raw email or display name, so connections cannot be confused
/// across users with the same name.
#[async_trait]
pub trait ConnectorClient: Send + Sync + std::fmt::Debug {
    async fn list_connections(&self, entity_id: &str) -> anyhow::Result<Vec<ConnectionInfo>>;

    async fn list_tools(&self, app: &str, entity_id: &str)
    -> anyhow::Result<Vec<ExternalToolSpec>>;

    async fn invoke(&self, tool: &str, args: Value, entity_id: &str) -> anyhow::Result<Value>;
}

/// Outcome of per-request external tool resolution.
#[derive(Debug, Clone, Default)]
pub struct ExternalResolution {
    pub tools: Vec<ToolDefinition>,
    pub connected_apps: Vec<String>,
    /// Set when resolution degraded (connector unreachable or timed out);
    /// consumed by the fallback controller, never surfaced as an error.
    pub failure: Option<String>,
}

/// Resolves external tool definitions for one request.
#[derive(Debug, Clone)]
pub struct ExternalToolResolver {
    connector: Arc<dyn ConnectorClient>,
    call_timeout: Duration,
}

impl ExternalToolResolver {
    #[must_use]
    pub fn new(connector: Arc<dyn ConnectorClient>, call_timeout: Duration) -> Self {
        Self {
            connector,
            call_timeout,
        }
    }

    /// Resolve tools for the requested apps, intersected with the entity's
    /// active connections. Never returns an error and never blocks past the
    /// configured timeout per connector call.
    pub async fn resolve(
        &self,
        requested_apps: &BTreeSet<String>,
        entity_id: &str,
    ) -> ExternalResolution {
        if requested_apps.is_empty() {
            return ExternalResolution::default();
        }

        let connections = match timeout(
            self.call_timeout,
            self.connector.list_connections(entity_id),
        )
        .await
        {
            Ok(Ok(connections)) => connections,
            Ok(Err(e)) => {
                tracing::warn!(entity_id = %entity_id, error = %e, "Connection lookup failed");
                return ExternalResolution {
                    failure: Some(format!("connection lookup failed: {e}")),
                    ..ExternalResolution::default()
                };
            }
            Err(_) => {
                tracing::warn!(entity_id = %entity_id, "Connection lookup timed out");
                return ExternalResolution {
                    failure: Some("connection lookup timed out".to_string()),
                    ..ExternalResolution::default()
                };
            }
        };

        let active: BTreeSet<String> = connections
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.app.clone())
            .collect();

        let mut tools = Vec::new();
        let mut connected_apps = Vec::new();
        let mut failure = None;

        for app in requested_apps.intersection(&active) {
            match timeout(self.call_timeout, self.connector.list_tools(app, entity_id)).await {
                Ok(Ok(specs)) => {
                    connected_apps.push(app.clone());
                    for spec in specs {
                        tools.push(self.definition_from_spec(spec, entity_id));
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(app = %app, error = %e, "Tool schema fetch failed");
                    failure = Some(format!("tool schema fetch failed for {app}: {e}"));
                }
                Err(_) => {
                    tracing::warn!(app = %app, "Tool schema fetch timed out");
                    failure = Some(format!("tool schema fetch timed out for {app}"));
                }
            }
        }

        ExternalResolution {
            tools,
            connected_apps,
            failure,
        }
    }

    fn definition_from_spec(&self, spec: ExternalToolSpec, entity_id: &str) -> ToolDefinition {
        ToolDefinition {
            name: spec.name.clone(),
            description: spec.description,
            parameters: spec.parameters,
            origin: ToolOrigin::External {
                app: spec.app.clone(),
            },
            // External tools are scoped by entity id, not by injected
            // workspace/user arguments.
            context: ContextRequirements::default(),
            executor: Arc::new(ExternalToolExecutor {
                connector: Arc::clone(&self.connector),
                tool: spec.name,
                entity_id: entity_id.to_string(),
                call_timeout: self.call_timeout,
            }),
        }
    }
}

/// Executor that invokes one connector tool on behalf of one entity.
#[derive(Debug)]
struct ExternalToolExecutor {
    connector: Arc<dyn ConnectorClient>,
    tool: String,
    entity_id: String,
    call_timeout: Duration,
}

#[async_trait]
impl ToolExecutor for ExternalToolExecutor {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        match timeout(
            self.call_timeout,
            self.connector.invoke(&self.tool, args, &self.entity_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => anyhow::bail!("external tool '{}' timed out", self.tool),
        }
    }
}

/// HTTP implementation of [`ConnectorClient`].
#[derive(Clone)]
pub struct HttpConnectorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpConnectorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnectorClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpConnectorClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid connector base url: {}", self.base_url))?;
        Ok(base.join(path)?)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => rb.bearer_auth(k),
            None => rb,
        }
    }
}

#[async_trait]
impl ConnectorClient for HttpConnectorClient {
    async fn list_connections(&self, entity_id: &str) -> anyhow::Result<Vec<ConnectionInfo>> {
        let mut url = self.url("/v1/connections")?;
        url.query_pairs_mut().append_pair("entityId", entity_id);
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn list_tools(
        &self,
        app: &str,
        entity_id: &str,
    ) -> anyhow::Result<Vec<ExternalToolSpec>> {
        let mut url = self.url("/v1/tools")?;
        url.query_pairs_mut()
            .append_pair("app", app)
            .append_pair("entityId", entity_id);
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn invoke(&self, tool: &str, args: Value, entity_id: &str) -> anyhow::Result<Value> {
        let url = self.url("/v1/invoke")?;
        let resp = self
            .authed(self.http.post(url))
            .json(&serde_json::json!({
                "tool": tool,
                "arguments": args,
                "entityId": entity_id,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// Scripted in-memory connector used for tests and local development.
#[derive(Debug, Default)]
pub struct StaticConnectorClient {
    connections: RwLock<HashMap<String, Vec<ConnectionInfo>>>,
    tools: RwLock<HashMap<String, Vec<ExternalToolSpec>>>,
    invocations: RwLock<Vec<(String, Value)>>,
    fail_invocations: RwLock<BTreeSet<String>>,
}

impl StaticConnectorClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active connection plus the tools it exposes.
    pub async fn connect_app(&self, entity_id: &str, app: &str, tools: Vec<ExternalToolSpec>) {
        self.connections
            .write()
            .await
            .entry(entity_id.to_string())
            .or_default()
            .push(ConnectionInfo {
                app: app.to_string(),
                entity_id: entity_id.to_string(),
                status: "active".to_string(),
            });
        self.tools.write().await.insert(app.to_string(), tools);
    }

    /// Make a specific tool fail on invocation.
    pub async fn fail_tool(&self, tool: &str) {
        self.fail_invocations.write().await.insert(tool.to_string());
    }

    /// Invocations observed so far, as `(tool, args)` pairs.
    pub async fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.read().await.clone()
    }
}

#[async_trait]
impl ConnectorClient for StaticConnectorClient {
    async fn list_connections(&self, entity_id: &str) -> anyhow::Result<Vec<ConnectionInfo>> {
        Ok(self
            .connections
            .read()
            .await
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tools(
        &self,
        app: &str,
        _entity_id: &str,
    ) -> anyhow::Result<Vec<ExternalToolSpec>> {
        Ok(self.tools.read().await.get(app).cloned().unwrap_or_default())
    }

    async fn invoke(&self, tool: &str, args: Value, _entity_id: &str) -> anyhow::Result<Value> {
        self.invocations
            .write()
            .await
            .push((tool.to_string(), args.clone()));
        if self.fail_invocations.read().await.contains(tool) {
            anyhow::bail!("simulated failure for {tool}");
        }
        Ok(serde_json::json!({ "status": "ok", "tool": tool }))
    }
}
