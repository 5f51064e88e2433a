//! Outbox queue storage

use rusqlite::{params, params_from_iter, Connection};

use crate::error::Result;
use crate::models::{OutboxEntry, OutboxPayload, OutboxStatus, OutboxType, RecordKind};

use super::parse_text;

const ENTRY_COLUMNS: &str =
    "id, created_at, status, type, payload, retry_count, auth_required, last_error";

/// Append one pending entry.
///
/// Callers pass the open transaction that also holds the record mutation, so
/// the change and its sync intent commit or roll back together.
pub fn enqueue(conn: &Connection, payload: &OutboxPayload, now: i64) -> Result<i64> {
    let body = payload.to_json()?;
    conn.execute(
        "INSERT INTO outbox (created_at, status, type, payload, retry_count, auth_required)
         VALUES (?, ?, ?, ?, 0, 0)",
        params![
            now,
            OutboxStatus::Pending.as_str(),
            payload.outbox_type().as_str(),
            body
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Trait for outbox delivery bookkeeping
pub trait OutboxRepository {
    /// Deliverable entries of one kind in FIFO order.
    ///
    /// Includes previously failed entries, excludes auth-frozen ones.
    fn list_deliverable(&self, kind: RecordKind) -> Result<Vec<OutboxEntry>>;

    /// Most recent entries regardless of status
    fn list_recent(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Get one entry by id
    fn get(&self, id: i64) -> Result<Option<OutboxEntry>>;

    /// Mark an entry delivered
    fn mark_sent(&self, id: i64) -> Result<()>;

    /// Record a failed attempt and keep the entry for retry
    fn mark_failed(&self, id: i64, message: &str) -> Result<()>;

    /// Freeze every undelivered entry until re-authentication
    fn flag_auth_required(&self) -> Result<usize>;

    /// Unfreeze entries after re-authentication
    fn clear_auth_required(&self) -> Result<usize>;

    /// Count entries with the given status
    fn count_by_status(&self, status: OutboxStatus) -> Result<usize>;

    /// Count entries frozen on authentication
    fn count_auth_required(&self) -> Result<usize>;
}

/// `SQLite` implementation of `OutboxRepository`
pub struct SqliteOutboxRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboxRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an outbox entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxEntry> {
        let outbox_type: OutboxType = parse_text(row, 3)?;
        let body: String = row.get(4)?;
        let payload = OutboxPayload::from_parts(outbox_type, &body).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })?;

        Ok(OutboxEntry {
            id: row.get(0)?,
            created_at: row.get(1)?,
            status: parse_text(row, 2)?,
            payload,
            retry_count: row.get(5)?,
            auth_required: row.get::<_, i32>(6)? != 0,
            last_error: row.get(7)?,
        })
    }
}

impl OutboxRepository for SqliteOutboxRepository<'_> {
    fn list_deliverable(&self, kind: RecordKind) -> Result<Vec<OutboxEntry>> {
        let types = kind.outbox_types();
        let placeholders = vec!["?"; types.len()].join(", ");
        let sql = format!(
            "SELECT {ENTRY_COLUMNS}
             FROM outbox
             WHERE type IN ({placeholders})
               AND status IN ('pending', 'failed')
               AND auth_required = 0
             ORDER BY created_at ASC, id ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params_from_iter(types.iter().map(|outbox_type| outbox_type.as_str())),
                Self::parse_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM outbox ORDER BY created_at DESC, id DESC LIMIT ?"
        ))?;
        let entries = stmt
            .query_map(params![limit], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get(&self, id: i64) -> Result<Option<OutboxEntry>> {
        let result = self.conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM outbox WHERE id = ?"),
            params![id],
            Self::parse_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn mark_sent(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE outbox SET status = ?, last_error = NULL WHERE id = ?",
            params![OutboxStatus::Sent.as_str(), id],
        )?;
        Ok(())
    }

    fn mark_failed(&self, id: i64, message: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE outbox
             SET status = ?, retry_count = retry_count + 1, last_error = ?
             WHERE id = ?",
            params![OutboxStatus::Failed.as_str(), message, id],
        )?;
        Ok(())
    }

    fn flag_auth_required(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE outbox SET auth_required = 1
             WHERE status IN ('pending', 'failed') AND auth_required = 0",
            [],
        )?;
        Ok(rows)
    }

    fn clear_auth_required(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE outbox SET auth_required = 0 WHERE auth_required = 1",
            [],
        )?;
        Ok(rows)
    }

    fn count_by_status(&self, status: OutboxStatus) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn count_auth_required(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE auth_required = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{PlayerPayload, PlayerProgress, TaskDeletePayload, TaskId};

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn delete_payload() -> OutboxPayload {
        OutboxPayload::DeleteTask(TaskDeletePayload { id: TaskId::new() })
    }

    fn player_payload(updated_at: i64) -> OutboxPayload {
        OutboxPayload::UpsertPlayer(PlayerPayload {
            progress: PlayerProgress::default(),
            updated_at,
        })
    }

    #[test]
    fn test_deliverable_is_fifo_and_filtered_by_kind() {
        let db = setup();
        let conn = db.connection();
        let second = enqueue(conn, &delete_payload(), 20).unwrap();
        let first = enqueue(conn, &delete_payload(), 10).unwrap();
        enqueue(conn, &player_payload(1), 5).unwrap();

        let repo = SqliteOutboxRepository::new(conn);
        let tasks = repo.list_deliverable(RecordKind::Tasks).unwrap();
        let ids: Vec<i64> = tasks.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![first, second]);

        let player = repo.list_deliverable(RecordKind::Player).unwrap();
        assert_eq!(player.len(), 1);
        assert_eq!(player[0].outbox_type(), OutboxType::UpsertPlayer);
    }

    #[test]
    fn test_mark_failed_keeps_entry_deliverable() {
        let db = setup();
        let conn = db.connection();
        let id = enqueue(conn, &delete_payload(), 1).unwrap();
        let repo = SqliteOutboxRepository::new(conn);

        repo.mark_failed(id, "offline").unwrap();
        repo.mark_failed(id, "still offline").unwrap();

        let entry = repo.get(id).unwrap().unwrap();
        assert_eq!(entry.status, OutboxStatus::Failed);
        assert_eq!(entry.retry_count, 2);
        assert_eq!(entry.last_error.as_deref(), Some("still offline"));
        assert_eq!(repo.list_deliverable(RecordKind::Tasks).unwrap().len(), 1);
    }

    #[test]
    fn test_sent_entries_leave_the_queue() {
        let db = setup();
        let conn = db.connection();
        let id = enqueue(conn, &delete_payload(), 1).unwrap();
        let repo = SqliteOutboxRepository::new(conn);

        repo.mark_sent(id).unwrap();

        assert!(repo.list_deliverable(RecordKind::Tasks).unwrap().is_empty());
        assert_eq!(repo.count_by_status(OutboxStatus::Sent).unwrap(), 1);
        assert_eq!(repo.count_by_status(OutboxStatus::Pending).unwrap(), 0);
    }

    #[test]
    fn test_auth_flag_freezes_and_unfreezes() {
        let db = setup();
        let conn = db.connection();
        enqueue(conn, &delete_payload(), 1).unwrap();
        enqueue(conn, &player_payload(2), 2).unwrap();
        let sent = enqueue(conn, &delete_payload(), 3).unwrap();
        let repo = SqliteOutboxRepository::new(conn);
        repo.mark_sent(sent).unwrap();

        assert_eq!(repo.flag_auth_required().unwrap(), 2);
        assert!(repo.list_deliverable(RecordKind::Tasks).unwrap().is_empty());
        assert!(repo.list_deliverable(RecordKind::Player).unwrap().is_empty());
        assert!(!repo.get(sent).unwrap().unwrap().auth_required);
        assert_eq!(repo.count_auth_required().unwrap(), 2);

        assert_eq!(repo.clear_auth_required().unwrap(), 2);
        assert_eq!(repo.count_auth_required().unwrap(), 0);
        assert_eq!(repo.list_deliverable(RecordKind::Tasks).unwrap().len(), 1);
    }
}
