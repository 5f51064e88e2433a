//! Storage for remote-originated changes, pull cursors and sync telemetry.
//!
//! Nothing here enqueues outbox entries: pulled data is already on the remote
//! backend and telemetry is device-local.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Player, PlayerPayload, RecordKind, SyncStatus, TaskPayload};

use super::player_repository::{fetch_player, store_player};
use super::task_repository::{fetch_task, next_stable_local_id};

/// What a last-write-wins merge did with one remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// Record was unknown locally
    Inserted,
    /// Remote copy was strictly newer and replaced the local one
    Updated,
    /// Local copy was as new or newer and was kept
    Skipped,
}

impl MergeResult {
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Trait for sync-side storage operations
pub trait SyncRepository {
    /// Merge remote tasks in one transaction
    fn merge_remote_tasks(&self, tasks: &[TaskPayload]) -> Result<Vec<MergeResult>>;

    /// Merge the remote player snapshot
    fn merge_remote_player(&self, remote: &PlayerPayload) -> Result<MergeResult>;

    /// Greatest server sequence merged for a kind
    fn pull_cursor(&self, kind: RecordKind) -> Result<Option<i64>>;

    /// Move the cursor forward, never backward, stamping the pull time
    fn advance_pull_cursor(&self, kind: RecordKind, server_seq: i64, pulled_at: i64)
        -> Result<()>;

    /// Record a successful cycle
    fn record_sync_success(&self, at: i64) -> Result<()>;

    /// Record a failed cycle, keeping the last success time
    fn record_sync_failure(&self, at: i64, message: &str) -> Result<()>;
}

/// `SQLite` implementation of `SyncRepository`
pub struct SqliteSyncRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn merge_task(conn: &Connection, remote: &TaskPayload) -> Result<MergeResult> {
        let Some(local) = fetch_task(conn, &remote.id)? else {
            conn.execute(
                "INSERT INTO tasks (id, title, due_date, status, created_at, completed_at,
                                    origin_device_id, stable_local_id, updated_at, sync_status)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    remote.id.as_str(),
                    remote.title,
                    remote.due_date.to_string(),
                    remote.status.as_str(),
                    remote.created_at,
                    remote.completed_at,
                    remote.origin_device_id,
                    next_stable_local_id(conn)?,
                    remote.updated_at,
                    SyncStatus::Synced.as_str()
                ],
            )?;
            return Ok(MergeResult::Inserted);
        };

        if remote.updated_at < local.updated_at {
            return Ok(MergeResult::Skipped);
        }
        if remote.updated_at == local.updated_at {
            // the remote holds this exact version
            conn.execute(
                "UPDATE tasks SET sync_status = ?1 WHERE id = ?2 AND sync_status != ?1",
                params![SyncStatus::Synced.as_str(), remote.id.as_str()],
            )?;
            return Ok(MergeResult::Skipped);
        }

        conn.execute(
            "UPDATE tasks
             SET title = ?, due_date = ?, status = ?, created_at = ?, completed_at = ?,
                 origin_device_id = ?, updated_at = ?, sync_status = ?
             WHERE id = ?",
            params![
                remote.title,
                remote.due_date.to_string(),
                remote.status.as_str(),
                remote.created_at,
                remote.completed_at,
                remote.origin_device_id,
                remote.updated_at,
                SyncStatus::Synced.as_str(),
                remote.id.as_str()
            ],
        )?;
        Ok(MergeResult::Updated)
    }

    /// Insert a default row when telemetry is written before any mutation
    fn ensure_player_row(&self) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO player (id, progress, updated_at, sync_status)
             VALUES (1, '{}', 0, ?)",
            params![SyncStatus::Synced.as_str()],
        )?;
        Ok(())
    }
}

impl SyncRepository for SqliteSyncRepository<'_> {
    fn merge_remote_tasks(&self, tasks: &[TaskPayload]) -> Result<Vec<MergeResult>> {
        let tx = self.conn.unchecked_transaction()?;
        let results = tasks
            .iter()
            .map(|remote| Self::merge_task(&tx, remote))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(results)
    }

    fn merge_remote_player(&self, remote: &PlayerPayload) -> Result<MergeResult> {
        let tx = self.conn.unchecked_transaction()?;
        let local = fetch_player(&tx)?;
        if remote.updated_at < local.updated_at {
            return Ok(MergeResult::Skipped);
        }
        if remote.updated_at == local.updated_at {
            if local.sync_status != SyncStatus::Synced {
                store_player(
                    &tx,
                    &Player {
                        sync_status: SyncStatus::Synced,
                        ..local
                    },
                )?;
                tx.commit()?;
            }
            return Ok(MergeResult::Skipped);
        }

        let existed = local.updated_at > 0;
        let merged = Player {
            progress: remote.progress.clone(),
            updated_at: remote.updated_at,
            sync_status: SyncStatus::Synced,
            telemetry: local.telemetry,
        };
        store_player(&tx, &merged)?;
        tx.commit()?;

        Ok(if existed {
            MergeResult::Updated
        } else {
            MergeResult::Inserted
        })
    }

    fn pull_cursor(&self, kind: RecordKind) -> Result<Option<i64>> {
        let cursor: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT server_seq FROM sync_cursors WHERE kind = ?",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor.flatten())
    }

    fn advance_pull_cursor(
        &self,
        kind: RecordKind,
        server_seq: i64,
        pulled_at: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_cursors (kind, last_pulled_at, server_seq) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind) DO UPDATE SET
                 last_pulled_at = excluded.last_pulled_at,
                 server_seq = MAX(COALESCE(server_seq, 0), excluded.server_seq)",
            params![kind.as_str(), pulled_at, server_seq],
        )?;
        Ok(())
    }

    fn record_sync_success(&self, at: i64) -> Result<()> {
        self.ensure_player_row()?;
        self.conn.execute(
            "UPDATE player
             SET last_sync_at = ?1, last_sync_ok_at = ?1,
                 last_sync_error_at = NULL, last_sync_error_message = NULL
             WHERE id = 1",
            params![at],
        )?;
        Ok(())
    }

    fn record_sync_failure(&self, at: i64, message: &str) -> Result<()> {
        self.ensure_player_row()?;
        self.conn.execute(
            "UPDATE player
             SET last_sync_at = ?1, last_sync_error_at = ?1, last_sync_error_message = ?2
             WHERE id = 1",
            params![at, message],
        )?;
        Ok(())
    }
}
