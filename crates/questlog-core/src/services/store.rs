//! Shared local store wrapper used by the sync engine and clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::db::{
    Database, MergeResult, OutboxRepository, PlayerRepository, SqliteOutboxRepository,
    SqlitePlayerRepository, SqliteSyncRepository, SqliteTaskRepository, SyncRepository,
    TaskRepository,
};
use crate::models::{
    OutboxEntry, OutboxStatus, Player, PlayerPayload, PlayerProgress, RecordKind, Task, TaskId,
    TaskPayload, TaskStatus,
};
use crate::rules::{self, Mutation, RuleResult};
use crate::{Error, Result};

const PREFIX_MATCH_LIMIT: usize = 2;

/// Thread-safe handle over the local database.
///
/// One transaction runs at a time; the lock is never held across network I/O.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    device_id: Arc<str>,
}

impl LocalStore {
    /// Open (creating and migrating) the store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>, config: &StoreConfig) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::open_with_recovery(&db_path)?;
        Ok(Self::from_database(db, Some(db_path), config))
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, None, config))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>, config: &StoreConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path,
            device_id: Arc::from(config.device_id.as_str()),
        }
    }

    fn open_with_recovery(db_path: &Path) -> Result<Database> {
        match Database::open(db_path) {
            Ok(db) => Ok(db),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(db_path)?;
                Database::open(db_path)
            }
            Err(error) => Err(error),
        }
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("questlog.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        // WAL and shared-memory sidecars belong to the quarantined file
        for suffix in ["-wal", "-shm", "-journal"] {
            let sidecar = parent.join(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale sidecar file {}", sidecar.display());
            }
        }

        Ok(())
    }

    async fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.db.lock().await;
        op(db.connection())
    }

    /// Device id stamped on tasks created here
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Filesystem path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub async fn schema_version(&self) -> Result<i32> {
        let db = self.db.lock().await;
        db.schema_version()
    }

    // Tasks

    /// Create a task due on `due_date`.
    pub async fn create_task(&self, title: &str, due_date: NaiveDate) -> Result<Mutation<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).create(title, due_date))
            .await
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).get(id))
            .await
    }

    /// List tasks by due date, newest first.
    pub async fn list_tasks(&self, limit: usize, offset: usize) -> Result<Vec<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).list(limit, offset))
            .await
    }

    /// List tasks due on one calendar day.
    pub async fn list_tasks_for_day(
        &self,
        due_date: NaiveDate,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| {
            SqliteTaskRepository::new(conn, &device_id).list_for_day(due_date, status)
        })
        .await
    }

    /// Resolve a full id or a unique id prefix.
    pub async fn resolve_task_id(&self, id_or_prefix: &str) -> Result<TaskId> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Err(Error::InvalidInput("task id must not be empty".to_string()));
        }
        if let Ok(id) = needle.parse::<TaskId>() {
            return Ok(id);
        }

        let device_id = Arc::clone(&self.device_id);
        let matches = self
            .with_conn(|conn| {
                SqliteTaskRepository::new(conn, &device_id)
                    .list_ids_by_prefix(needle, PREFIX_MATCH_LIMIT)
            })
            .await?;

        match matches.as_slice() {
            [] => Err(Error::NotFound(format!("task {needle}"))),
            [only] => only.parse().map_err(|_| {
                Error::Database(format!("stored task id is not a valid UUID: {only}"))
            }),
            _ => Err(Error::InvalidInput(format!(
                "task id prefix '{needle}' is ambiguous"
            ))),
        }
    }

    pub async fn rename_task(&self, id: &TaskId, title: &str) -> Result<Mutation<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).rename(id, title))
            .await
    }

    pub async fn reschedule_task(&self, id: &TaskId, due_date: NaiveDate) -> Result<Mutation<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| {
            SqliteTaskRepository::new(conn, &device_id).reschedule(id, due_date)
        })
        .await
    }

    /// Mark a pending task done.
    pub async fn complete_task(&self, id: &TaskId) -> Result<Mutation<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).complete(id))
            .await
    }

    /// Move a done task back to pending.
    pub async fn reopen_task(&self, id: &TaskId) -> Result<Mutation<Task>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).reopen(id))
            .await
    }

    /// Hard-delete a task and queue the remote deletion.
    pub async fn delete_task(&self, id: &TaskId) -> Result<Mutation<TaskId>> {
        let device_id = Arc::clone(&self.device_id);
        self.with_conn(|conn| SqliteTaskRepository::new(conn, &device_id).delete(id))
            .await
    }

    // Player

    /// Load the player, defaults when nothing was stored yet.
    pub async fn get_player(&self) -> Result<Player> {
        self.with_conn(|conn| SqlitePlayerRepository::new(conn).get())
            .await
    }

    /// Apply any game rule to the player and queue the new snapshot.
    pub async fn update_player<F>(&self, action: &str, rule: F) -> Result<Mutation<Player>>
    where
        F: FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress>,
    {
        let result = self
            .with_conn(|conn| SqlitePlayerRepository::new(conn).update(rule))
            .await?;
        if let Some(rejection) = result.rejection() {
            tracing::debug!("Player action {action} rejected: {rejection}");
        } else {
            tracing::debug!("Player action {action} applied");
        }
        Ok(result)
    }

    pub async fn award(&self, currency: i64, experience: i64) -> Result<Mutation<Player>> {
        self.update_player("award", rules::award(currency, experience))
            .await
    }

    pub async fn spend_currency(&self, amount: i64) -> Result<Mutation<Player>> {
        self.update_player("spend", rules::spend(amount)).await
    }

    pub async fn unlock_item(&self, item: &str, cost: i64) -> Result<Mutation<Player>> {
        self.update_player("unlock", rules::unlock(item, cost))
            .await
    }

    pub async fn claim_reward(&self, reward: &str, currency: i64) -> Result<Mutation<Player>> {
        self.update_player("claim_reward", rules::claim_reward(reward, currency))
            .await
    }

    pub async fn collect_idle(&self, amount: i64, collected_at: i64) -> Result<Mutation<Player>> {
        self.update_player("collect_idle", rules::collect_idle(amount, collected_at))
            .await
    }

    // Outbox

    /// Deliverable entries of one kind in FIFO order.
    pub async fn deliverable_outbox(&self, kind: RecordKind) -> Result<Vec<OutboxEntry>> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).list_deliverable(kind))
            .await
    }

    /// Most recent entries of any status, newest first.
    pub async fn recent_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).list_recent(limit))
            .await
    }

    pub async fn mark_outbox_sent(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).mark_sent(id))
            .await
    }

    pub async fn mark_outbox_failed(&self, id: i64, message: &str) -> Result<()> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).mark_failed(id, message))
            .await
    }

    /// Freeze every undelivered entry until re-authentication.
    pub async fn flag_outbox_auth_required(&self) -> Result<usize> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).flag_auth_required())
            .await
    }

    pub async fn clear_outbox_auth_required(&self) -> Result<usize> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).clear_auth_required())
            .await
    }

    pub async fn count_outbox(&self, status: OutboxStatus) -> Result<usize> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).count_by_status(status))
            .await
    }

    pub async fn count_outbox_auth_required(&self) -> Result<usize> {
        self.with_conn(|conn| SqliteOutboxRepository::new(conn).count_auth_required())
            .await
    }

    // Remote merge and telemetry

    pub async fn merge_remote_tasks(&self, tasks: &[TaskPayload]) -> Result<Vec<MergeResult>> {
        self.with_conn(|conn| SqliteSyncRepository::new(conn).merge_remote_tasks(tasks))
            .await
    }

    pub async fn merge_remote_player(&self, remote: &PlayerPayload) -> Result<MergeResult> {
        self.with_conn(|conn| SqliteSyncRepository::new(conn).merge_remote_player(remote))
            .await
    }

    pub async fn pull_cursor(&self, kind: RecordKind) -> Result<Option<i64>> {
        self.with_conn(|conn| SqliteSyncRepository::new(conn).pull_cursor(kind))
            .await
    }

    /// Record the highest server sequence merged for `kind`
    pub async fn advance_pull_cursor(&self, kind: RecordKind, server_seq: i64) -> Result<()> {
        let pulled_at = crate::util::now_ms();
        self.with_conn(move |conn| {
            SqliteSyncRepository::new(conn).advance_pull_cursor(kind, server_seq, pulled_at)
        })
        .await
    }

    pub async fn record_sync_success(&self, at: i64) -> Result<()> {
        self.with_conn(|conn| SqliteSyncRepository::new(conn).record_sync_success(at))
            .await
    }

    pub async fn record_sync_failure(&self, at: i64, message: &str) -> Result<()> {
        self.with_conn(|conn| SqliteSyncRepository::new(conn).record_sync_failure(at, message))
            .await
    }
}
