//! Remote backend interface consumed by the sync engine.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{PlayerPayload, TaskId, TaskPayload};

/// Failure reported by a remote backend call.
///
/// `status` is the HTTP status when the backend answered; `None` means the
/// request never produced a response (connectivity, DNS, timeout...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    /// Error carrying an HTTP status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Error without a response
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Error with a message only
    pub fn message(message: impl Into<String>) -> Self {
        Self::network(message)
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) if !self.message.contains(&status.to_string()) => {
                format!("{} ({status})", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

/// A task row as the remote stores it.
///
/// `server_seq` is stamped by the backend on every insert or update and only
/// grows. It orders changes by arrival, so an edit made offline long ago is
/// still newer than anything pulled before it landed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTask {
    #[serde(flatten)]
    pub task: TaskPayload,
    pub server_seq: i64,
}

/// Per-kind upsert/delete operations plus "changed since" queries
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn upsert_task(&self, user_id: &str, task: &TaskPayload) -> Result<(), RemoteError>;

    async fn delete_task(&self, user_id: &str, id: TaskId) -> Result<(), RemoteError>;

    async fn upsert_player(&self, user_id: &str, player: &PlayerPayload)
        -> Result<(), RemoteError>;

    /// Tasks with `server_seq` strictly greater than `since`, or all tasks,
    /// in `server_seq` order
    async fn fetch_tasks_since(
        &self,
        user_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<RemoteTask>, RemoteError>;

    async fn fetch_player(&self, user_id: &str) -> Result<Option<PlayerPayload>, RemoteError>;
}

/// Credentials handed to each sync cycle.
///
/// Either half missing means "offline only" and makes a cycle a no-op.
#[derive(Clone, Default)]
pub struct SyncCredentials {
    pub client: Option<Arc<dyn RemoteBackend>>,
    pub user_id: Option<String>,
}

impl SyncCredentials {
    pub fn new(client: Arc<dyn RemoteBackend>, user_id: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            user_id: Some(user_id.into()),
        }
    }

    /// No remote configured
    pub fn offline() -> Self {
        Self::default()
    }

    /// Both halves when present and non-empty
    pub fn resolve(&self) -> Option<(&dyn RemoteBackend, &str)> {
        let client = self.client.as_deref()?;
        let user_id = self.user_id.as_deref().map(str::trim)?;
        if user_id.is_empty() {
            return None;
        }
        Some((client, user_id))
    }

    pub fn is_configured(&self) -> bool {
        self.resolve().is_some()
    }
}

impl fmt::Debug for SyncCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncCredentials")
            .field("client", &self.client.as_ref().map(|_| "[REMOTE]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::MockRemote;

    #[test]
    fn remote_error_display_includes_status_once() {
        assert_eq!(
            RemoteError::http(422, "bad shape").to_string(),
            "bad shape (422)"
        );
        assert_eq!(
            RemoteError::http(401, "JWT expired (401)").to_string(),
            "JWT expired (401)"
        );
        assert_eq!(
            RemoteError::network("Failed to fetch").to_string(),
            "Failed to fetch"
        );
    }

    #[test]
    fn credentials_need_client_and_user() {
        assert!(!SyncCredentials::offline().is_configured());

        let client: Arc<dyn RemoteBackend> = Arc::new(MockRemote::default());
        let missing_user = SyncCredentials {
            client: Some(client.clone()),
            user_id: Some("  ".to_string()),
        };
        assert!(!missing_user.is_configured());
        assert!(SyncCredentials::new(client, "user-1").is_configured());
    }
}
