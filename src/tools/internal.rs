//! Static internal tool registry.
//!
//! Internal tools are read-only lookups against the workspace's own data
//! store. The list is built once at process start and is read-only
//! afterwards; per-request scoping happens in the assembler. Each
//! definition declares which context fields (workspace id, user id) must be
//! injected at call time; the values never come from model-controlled
//! arguments.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ContextRequirements, ToolDefinition, ToolExecutor, ToolOrigin};
use crate::workspace::WorkspaceStore;

/// The process-wide internal tool catalog.
#[derive(Debug)]
pub struct InternalToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl InternalToolRegistry {
    /// Build the standard catalog against the given store.
    #[must_use]
    pub fn standard(store: Arc<dyn WorkspaceStore>) -> Self {
        let tools = vec![
            ToolDefinition {
                name: "tasks_due".to_string(),
                description: "List the user's tasks, optionally filtered by due date \
                              ('today', 'week', or an ISO date)."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "due": {
                            "type": "string",
                            "description": "Due date filter: 'today', 'week', or YYYY-MM-DD."
                        }
                    }
                }),
                origin: ToolOrigin::Internal,
                context: ContextRequirements {
                    needs_workspace_id: true,
                    needs_user_id: true,
                },
                executor: Arc::new(TasksDueTool {
                    store: Arc::clone(&store),
                }),
            },
            ToolDefinition {
                name: "document_search".to_string(),
                description: "Full-text search across workspace documents.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search query." },
                        "limit": { "type": "integer", "description": "Max results (default 5)." }
                    },
                    "required": ["query"]
                }),
                origin: ToolOrigin::Internal,
                context: ContextRequirements {
                    needs_workspace_id: true,
                    needs_user_id: false,
                },
                executor: Arc::new(DocumentSearchTool {
                    store: Arc::clone(&store),
                }),
            },
            ToolDefinition {
                name: "member_lookup".to_string(),
                description: "Look up workspace members by name.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Name or name fragment." }
                    },
                    "required": ["query"]
                }),
                origin: ToolOrigin::Internal,
                context: ContextRequirements {
                    needs_workspace_id: true,
                    needs_user_id: false,
                },
                executor: Arc::new(MemberLookupTool {
                    store: Arc::clone(&store),
                }),
            },
            ToolDefinition {
                name: "workspace_summary".to_string(),
                description: "Summarize current workspace activity (open tasks, documents, members)."
                    .to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
                origin: ToolOrigin::Internal,
                context: ContextRequirements {
                    needs_workspace_id: true,
                    needs_user_id: false,
                },
                executor: Arc::new(WorkspaceSummaryTool { store }),
            },
        ];

        Self { tools }
    }

    /// The ordered tool list.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing required argument '{key}'"))
}

#[derive(Debug)]
struct TasksDueTool {
    store: Arc<dyn WorkspaceStore>,
}

#[async_trait]
impl ToolExecutor for TasksDueTool {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let workspace_id = required_str(&args, "workspace_id")?;
        let user_id = required_str(&args, "user_id")?;
        let due = args.get("due").and_then(Value::as_str);

        let tasks = self.store.tasks_for_user(workspace_id, user_id, due).await?;
        Ok(json!({ "tasks": tasks }))
    }
}

#[derive(Debug)]
struct DocumentSearchTool {
    store: Arc<dyn WorkspaceStore>,
}

#[async_trait]
impl ToolExecutor for DocumentSearchTool {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let workspace_id = required_str(&args, "workspace_id")?;
        let query = required_str(&args, "query")?;
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(5) as usize;

        let hits = self.store.search_documents(workspace_id, query, limit).await?;
        Ok(json!({ "documents": hits }))
    }
}

#[derive(Debug)]
struct MemberLookupTool {
    store: Arc<dyn WorkspaceStore>,
}

#[async_trait]
impl ToolExecutor for MemberLookupTool {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let workspace_id = required_str(&args, "workspace_id")?;
        let query = required_str(&args, "query")?;

        let members = self.store.find_members(workspace_id, query).await?;
        Ok(json!({ "members": members }))
    }
}

#[derive(Debug)]
struct WorkspaceSummaryTool {
    store: Arc<dyn WorkspaceStore>,
}

#[async_trait]
impl ToolExecutor for WorkspaceSummaryTool {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let workspace_id = required_str(&args, "workspace_id")?;
        self.store.workspace_summary(workspace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{InMemoryWorkspaceStore, TaskItem};

    #[tokio::test]
    async fn test_registry_has_unique_names() {
        let store: Arc<dyn WorkspaceStore> = Arc::new(InMemoryWorkspaceStore::new());
        let registry = InternalToolRegistry::standard(store);

        let mut names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(total >= 4);
    }

    #[tokio::test]
    async fn test_all_internal_origin() {
        let store: Arc<dyn WorkspaceStore> = Arc::new(InMemoryWorkspaceStore::new());
        let registry = InternalToolRegistry::standard(store);
        assert!(registry.tools().iter().all(|t| !t.origin.is_external()));
    }

    #[tokio::test]
    async fn test_tasks_due_requires_injected_context() {
        let store = Arc::new(InMemoryWorkspaceStore::new());
        store
            .add_task(
                "ws-1",
                TaskItem {
                    id: "t1".into(),
                    title: "Review budget".into(),
                    assignee_id: "u1".into(),
                    due_date: None,
                    status: "open".into(),
                },
            )
            .await;

        let registry = InternalToolRegistry::standard(store as Arc<dyn WorkspaceStore>);
        let tool = registry
            .tools()
            .iter()
            .find(|t| t.name == "tasks_due")
            .unwrap();

        // Without injected context the call must fail, not guess.
        let err = tool.executor.call(json!({})).await;
        assert!(err.is_err());

        let result = tool
            .executor
            .call(json!({"workspace_id": "ws-1", "user_id": "u1"}))
            .await
            .unwrap();
        assert_eq!(result["tasks"].as_array().unwrap().len(), 1);
    }
}
