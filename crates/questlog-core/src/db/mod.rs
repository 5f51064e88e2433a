//! Database layer for Questlog

mod connection;
mod migrations;
mod outbox_repository;
mod player_repository;
mod sync_repository;
mod task_repository;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

pub use connection::Database;
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use outbox_repository::{enqueue, OutboxRepository, SqliteOutboxRepository};
pub use player_repository::{PlayerRepository, SqlitePlayerRepository};
pub use sync_repository::{MergeResult, SqliteSyncRepository, SyncRepository};
pub use task_repository::{SqliteTaskRepository, TaskRepository};

/// Read a TEXT column through `FromStr`
pub(crate) fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Read a TEXT column holding JSON
pub(crate) fn parse_json<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Next `updated_at` for a local change.
///
/// Always moves forward so every mutation bumps the conflict signal, even
/// when two writes land in the same millisecond.
pub(crate) const fn next_updated_at(previous: i64, now: i64) -> i64 {
    if now > previous {
        now
    } else {
        previous + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_updated_at_is_strictly_increasing() {
        assert_eq!(next_updated_at(10, 20), 20);
        assert_eq!(next_updated_at(20, 20), 21);
        assert_eq!(next_updated_at(30, 20), 31);
    }
}
