//! Append-only audit trail for external tool invocations.
//!
//! Every attempt to invoke a connected third-party tool, success or
//! failure, produces exactly one [`AuditRecord`] before the executor
//! returns. Recording is best-effort: a sink failure degrades to a local
//! warning and a typed [`AuditStatus::Degraded`], never to a failed user
//! request. The pipeline never mutates or deletes records.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::envelope::ExecutionPath;

/// Argument keys whose values are redacted before persistence.
const SENSITIVE_KEYS: &[&str] = &[
    "secret",
    "token",
    "password",
    "api_key",
    "apikey",
    "authorization",
    "credential",
];

const REDACTED: &str = "[redacted]";

/// One audit entry for an external tool invocation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolkit: Option<String>,
    /// Sanitized copy of the call arguments.
    pub arguments_snapshot: Value,
    /// "success" or "error".
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_path: ExecutionPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of an audit write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Recorded,
    /// The sink failed; the attempt was logged locally instead.
    Degraded,
}

/// Collaborator interface owning audit persistence.
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Append one record. Implementations must not block the caller beyond
    /// a small bounded time.
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// Best-effort logger wrapping an [`AuditSink`].
#[derive(Debug, Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record one external invocation attempt. Sanitizes the argument
    /// snapshot, then appends; a sink failure is downgraded to a warning.
    pub async fn record(&self, mut record: AuditRecord) -> AuditStatus {
        record.arguments_snapshot = sanitize_arguments(record.arguments_snapshot);

        match self.sink.append(record.clone()).await {
            Ok(()) => AuditStatus::Recorded,
            Err(e) => {
                tracing::warn!(
                    tool = %record.tool_name,
                    workspace_id = %record.workspace_id,
                    error = %e,
                    "Audit sink write failed; continuing degraded"
                );
                AuditStatus::Degraded
            }
        }
    }
}

/// Recursively redact sensitive keys from an argument snapshot.
#[must_use]
pub fn sanitize_arguments(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let lower = k.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                        (k, Value::String(REDACTED.to_string()))
                    } else {
                        (k, sanitize_arguments(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_arguments).collect()),
        other => other,
    }
}

/// In-memory sink used by tests and local development.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}

/// Append-only JSONL file sink.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    // Serializes writers so concurrent appends cannot interleave lines.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(&record)?;
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}
