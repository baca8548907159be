//! Pending-confirmation storage.
//!
//! When the confirmation gate interrupts a turn, the proposed tool-call set
//! is parked here keyed by the caller (workspace + member). The next
//! decision turn executes the *original* calls, never a re-generated set,
//! and an unrelated message while a confirmation is outstanding cannot
//! silently execute the action. Entries expire after a TTL so abandoned
//! confirmations do not linger.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::tools::ToolCallRequest;

/// Default lifetime of a parked confirmation (10 minutes).
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(10 * 60);

/// A gated action awaiting an explicit user decision.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub workspace_id: String,
    pub member_id: Option<String>,
    /// The original proposed calls, executed verbatim on confirmation.
    pub calls: Vec<ToolCallRequest>,
    /// Apps the calls touch, so the decision turn can re-resolve the same
    /// external tools.
    pub requested_apps: BTreeSet<String>,
    /// Human-readable summary shown in the confirmation prompt.
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    fn is_expired(&self, ttl: Duration) -> bool {
        let age = Utc::now() - self.created_at;
        age.to_std().map(|d| d > ttl).unwrap_or(false)
    }
}

/// Thread-safe store for pending confirmations.
#[derive(Debug, Clone)]
pub struct PendingActionStore {
    inner: Arc<RwLock<HashMap<String, PendingAction>>>,
    ttl: Duration,
}

impl Default for PendingActionStore {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_TTL)
    }
}

impl PendingActionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Park a proposed action, replacing any earlier one for the caller.
    pub async fn put(&self, key: impl Into<String>, action: PendingAction) {
        self.inner.write().await.insert(key.into(), action);
    }

    /// Peek at the caller's pending action, if any and not expired.
    pub async fn get(&self, key: &str) -> Option<PendingAction> {
        let guard = self.inner.read().await;
        guard
            .get(key)
            .filter(|a| !a.is_expired(self.ttl))
            .cloned()
    }

    /// Remove and return the caller's pending action. Expired entries are
    /// dropped rather than returned.
    pub async fn take(&self, key: &str) -> Option<PendingAction> {
        let mut guard = self.inner.write().await;
        let action = guard.remove(key)?;
        if action.is_expired(self.ttl) {
            None
        } else {
            Some(action)
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, action| !action.is_expired(self.ttl));
        before - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(summary: &str) -> PendingAction {
        PendingAction {
            workspace_id: "ws-1".into(),
            member_id: Some("m-1".into()),
            calls: Vec::new(),
            requested_apps: BTreeSet::new(),
            summary: summary.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_get_take() {
        let store = PendingActionStore::default();
        assert!(store.get("ws-1:m-1").await.is_none());

        store.put("ws-1:m-1", action("delete #general")).await;
        assert_eq!(
            store.get("ws-1:m-1").await.unwrap().summary,
            "delete #general"
        );

        let taken = store.take("ws-1:m-1").await.unwrap();
        assert_eq!(taken.summary, "delete #general");
        assert!(store.get("ws-1:m-1").await.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let store = PendingActionStore::default();
        store.put("k", action("first")).await;
        store.put("k", action("second")).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("k").await.unwrap().summary, "second");
    }

    #[tokio::test]
    async fn test_expired_entries_not_returned() {
        let store = PendingActionStore::new(Duration::from_secs(60));
        let mut stale = action("old");
        stale.created_at = Utc::now() - chrono::Duration::seconds(120);
        store.put("k", stale).await;

        assert!(store.get("k").await.is_none());
        assert!(store.take("k").await.is_none());

        store.put("k2", action("fresh")).await;
        let mut stale2 = action("old2");
        stale2.created_at = Utc::now() - chrono::Duration::seconds(120);
        store.put("k3", stale2).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
