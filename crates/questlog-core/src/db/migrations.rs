//! Database migrations
//!
//! Forward-only and additive: a version may add tables or columns (with
//! defaults and a back-fill step) but never drops or repurposes a field.

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = current_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }
    if version < 4 {
        migrate_v4(conn)?;
    }

    Ok(())
}

/// Get the current schema version
pub fn current_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply one version's statements atomically
fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: tasks, player singleton and outbox
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                due_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                completed_at INTEGER,
                origin_device_id TEXT NOT NULL DEFAULT '',
                updated_at INTEGER NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE INDEX IF NOT EXISTS idx_tasks_due_status ON tasks(due_date, status)",
            "CREATE INDEX IF NOT EXISTS idx_tasks_updated ON tasks(updated_at DESC)",
            "CREATE TABLE IF NOT EXISTS player (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                progress TEXT NOT NULL DEFAULT '{}',
                updated_at INTEGER NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE TABLE IF NOT EXISTS outbox (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                type TEXT NOT NULL,
                payload TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_outbox_status_created ON outbox(status, created_at)",
        ],
    )
}

/// Migration to version 2: auth freeze on outbox entries and sync telemetry
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "ALTER TABLE outbox ADD COLUMN auth_required INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE outbox ADD COLUMN last_error TEXT",
            "ALTER TABLE player ADD COLUMN last_sync_at INTEGER",
            "ALTER TABLE player ADD COLUMN last_sync_ok_at INTEGER",
            "ALTER TABLE player ADD COLUMN last_sync_error_at INTEGER",
            "ALTER TABLE player ADD COLUMN last_sync_error_message TEXT",
        ],
    )
}

/// Migration to version 3: stable local ids and pull cursors
fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        3,
        &[
            "ALTER TABLE tasks ADD COLUMN stable_local_id INTEGER",
            "UPDATE tasks SET stable_local_id = rowid WHERE stable_local_id IS NULL",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_stable_local_id ON tasks(stable_local_id)",
            "CREATE TRIGGER IF NOT EXISTS tasks_stable_local_id_guard BEFORE UPDATE OF stable_local_id ON tasks
             FOR EACH ROW
             WHEN OLD.stable_local_id IS NOT NULL AND NEW.stable_local_id IS NOT OLD.stable_local_id
             BEGIN
                 SELECT RAISE(ABORT, 'stable_local_id is immutable');
             END",
            "CREATE TABLE IF NOT EXISTS sync_cursors (
                kind TEXT PRIMARY KEY,
                last_pulled_at INTEGER NOT NULL
            )",
        ],
    )
}

/// Migration to version 4: server-assigned pull watermark.
///
/// Cursors written by version 3 hold client timestamps, which cannot be
/// compared with server sequence numbers, so the new column starts NULL and
/// the next pull fetches everything once.
fn migrate_v4(conn: &Connection) -> Result<()> {
    apply(
        conn,
        4,
        &["ALTER TABLE sync_cursors ADD COLUMN server_seq INTEGER"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        names.iter().any(|name| name == column)
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = current_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_upgrade_from_v1_backfills_existing_rows() {
        let conn = setup();
        migrate_v1(&conn).unwrap();

        conn.execute(
            "INSERT INTO tasks (id, title, due_date, created_at, updated_at)
             VALUES ('a', 'old task', '2026-01-02', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO outbox (created_at, type, payload) VALUES (1, 'UPSERT_TASK', '{}')",
            [],
        )
        .unwrap();

        run(&conn).unwrap();

        assert!(column_exists(&conn, "player", "last_sync_ok_at"));
        let stable_id: Option<i64> = conn
            .query_row("SELECT stable_local_id FROM tasks WHERE id = 'a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(stable_id.is_some());

        let (auth_required, title): (i64, String) = conn
            .query_row(
                "SELECT o.auth_required, t.title FROM outbox o, tasks t LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(auth_required, 0);
        assert_eq!(title, "old task");
    }

    #[test]
    fn test_upgrade_from_v3_resets_pull_watermark() {
        let conn = setup();
        migrate_v1(&conn).unwrap();
        migrate_v2(&conn).unwrap();
        migrate_v3(&conn).unwrap();
        conn.execute(
            "INSERT INTO sync_cursors (kind, last_pulled_at) VALUES ('tasks', 1700000000000)",
            [],
        )
        .unwrap();

        run(&conn).unwrap();

        assert!(column_exists(&conn, "sync_cursors", "server_seq"));
        let server_seq: Option<i64> = conn
            .query_row(
                "SELECT server_seq FROM sync_cursors WHERE kind = 'tasks'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(server_seq, None);
    }

    #[test]
    fn test_stable_local_id_cannot_change() {
        let conn = setup();
        run(&conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (id, title, due_date, created_at, updated_at, stable_local_id)
             VALUES ('a', 't', '2026-01-02', 1, 1, 5)",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE tasks SET stable_local_id = 6 WHERE id = 'a'", []);
        assert!(result.is_err());

        // Rewriting the same value is allowed
        conn.execute("UPDATE tasks SET stable_local_id = 5, title = 'u' WHERE id = 'a'", [])
            .unwrap();
    }
}
