//! Workspace data store collaborator.
//!
//! Internal tools read workspace data through this boundary. The store is
//! responsible for its own authorization: it must verify that the injected
//! workspace/user identity owns the requested data, because the
//! orchestration layer does not treat an offered tool call as proof of
//! access.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// A task row as exposed to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub assignee_id: String,
    pub due_date: Option<String>,
    pub status: String,
}

/// A document search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHit {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub snippet: String,
}

/// A member directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

/// Read-only store behind the internal tools.
#[async_trait]
pub trait WorkspaceStore: Send + Sync + std::fmt::Debug {
    /// Tasks assigned to the user, optionally filtered by due date
    /// (`today`, `week`, or an ISO date).
    async fn tasks_for_user(
        &self,
        workspace_id: &str,
        user_id: &str,
        due: Option<&str>,
    ) -> anyhow::Result<Vec<TaskItem>>;

    /// Full-text search across workspace documents.
    async fn search_documents(
        &self,
        workspace_id: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<DocumentHit>>;

    /// Member directory lookup by name fragment.
    async fn find_members(
        &self,
        workspace_id: &str,
        query: &str,
    ) -> anyhow::Result<Vec<MemberEntry>>;

    /// A compact activity summary for the workspace.
    async fn workspace_summary(&self, workspace_id: &str) -> anyhow::Result<Value>;
}

/// In-memory store used for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryWorkspaceStore {
    tasks: RwLock<HashMap<String, Vec<TaskItem>>>,
    documents: RwLock<HashMap<String, Vec<DocumentHit>>>,
    members: RwLock<HashMap<String, Vec<MemberEntry>>>,
}

impl InMemoryWorkspaceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_task(&self, workspace_id: &str, task: TaskItem) {
        self.tasks
            .write()
            .await
            .entry(workspace_id.to_string())
            .or_default()
            .push(task);
    }

    pub async fn add_document(&self, workspace_id: &str, doc: DocumentHit) {
        self.documents
            .write()
            .await
            .entry(workspace_id.to_string())
            .or_default()
            .push(doc);
    }

    pub async fn add_member(&self, workspace_id: &str, member: MemberEntry) {
        self.members
            .write()
            .await
            .entry(workspace_id.to_string())
            .or_default()
            .push(member);
    }
}

#[async_trait]
impl WorkspaceStore for InMemoryWorkspaceStore {
    async fn tasks_for_user(
        &self,
        workspace_id: &str,
        user_id: &str,
        due: Option<&str>,
    ) -> anyhow::Result<Vec<TaskItem>> {
        let guard = self.tasks.read().await;
        let tasks = guard.get(workspace_id).cloned().unwrap_or_default();
        Ok(tasks
            .into_iter()
            .filter(|t| t.assignee_id == user_id)
            .filter(|t| match due {
                Some("today") => t.due_date.as_deref() == Some(today().as_str()),
                Some(date) if date != "week" => t.due_date.as_deref() == Some(date),
                _ => true,
            })
            .collect())
    }

    async fn search_documents(
        &self,
        workspace_id: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<DocumentHit>> {
        let lower = query.to_lowercase();
        let guard = self.documents.read().await;
        let docs = guard.get(workspace_id).cloned().unwrap_or_default();
        Ok(docs
            .into_iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&lower) || d.snippet.to_lowercase().contains(&lower)
            })
            .take(limit)
            .collect())
    }

    async fn find_members(
        &self,
        workspace_id: &str,
        query: &str,
    ) -> anyhow::Result<Vec<MemberEntry>> {
        let lower = query.to_lowercase();
        let guard = self.members.read().await;
        let members = guard.get(workspace_id).cloned().unwrap_or_default();
        Ok(members
            .into_iter()
            .filter(|m| m.display_name.to_lowercase().contains(&lower))
            .collect())
    }

    async fn workspace_summary(&self, workspace_id: &str) -> anyhow::Result<Value> {
        let task_count = self
            .tasks
            .read()
            .await
            .get(workspace_id)
            .map_or(0, Vec::len);
        let doc_count = self
            .documents
            .read()
            .await
            .get(workspace_id)
            .map_or(0, Vec::len);
        let member_count = self
            .members
            .read()
            .await
            .get(workspace_id)
            .map_or(0, Vec::len);

        Ok(serde_json::json!({
            "workspaceId": workspace_id,
            "openTasks": task_count,
            "documents": doc_count,
            "members": member_count,
        }))
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
