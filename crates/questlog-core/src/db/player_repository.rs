//! Player repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{OutboxPayload, Player, PlayerPayload, PlayerProgress, SyncStatus, SyncTelemetry};
use crate::rules::{Mutation, RuleResult};
use crate::util::now_ms;

use super::{enqueue, next_updated_at, parse_json, parse_text};

/// Load the singleton, falling back to fresh defaults when absent
pub(crate) fn fetch_player(conn: &Connection) -> Result<Player> {
    let player = conn
        .query_row(
            "SELECT progress, updated_at, sync_status, last_sync_at, last_sync_ok_at,
                    last_sync_error_at, last_sync_error_message
             FROM player WHERE id = 1",
            [],
            |row| {
                Ok(Player {
                    progress: parse_json(row, 0)?,
                    updated_at: row.get(1)?,
                    sync_status: parse_text(row, 2)?,
                    telemetry: SyncTelemetry {
                        last_sync_at: row.get(3)?,
                        last_sync_ok_at: row.get(4)?,
                        last_sync_error_at: row.get(5)?,
                        last_sync_error_message: row.get(6)?,
                    },
                })
            },
        )
        .optional()?;

    Ok(player.unwrap_or_default())
}

/// Write the synced fields of the singleton, leaving telemetry alone
pub(crate) fn store_player(conn: &Connection, player: &Player) -> Result<()> {
    let progress = serde_json::to_string(&player.progress)?;
    conn.execute(
        "INSERT INTO player (id, progress, updated_at, sync_status)
         VALUES (1, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             progress = excluded.progress,
             updated_at = excluded.updated_at,
             sync_status = excluded.sync_status",
        params![progress, player.updated_at, player.sync_status.as_str()],
    )?;
    Ok(())
}

/// Trait for player storage operations
pub trait PlayerRepository {
    /// Load the player, or defaults when no row exists yet
    fn get(&self) -> Result<Player>;

    /// Apply a game rule and queue the resulting snapshot
    fn update<F>(&self, rule: F) -> Result<Mutation<Player>>
    where
        F: FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress>;
}

/// `SQLite` implementation of `PlayerRepository`
pub struct SqlitePlayerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePlayerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PlayerRepository for SqlitePlayerRepository<'_> {
    fn get(&self) -> Result<Player> {
        fetch_player(self.conn)
    }

    fn update<F>(&self, rule: F) -> Result<Mutation<Player>>
    where
        F: FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let current = fetch_player(&tx)?;

        let progress = match rule(&current.progress) {
            Ok(progress) => progress,
            Err(rejection) => return Ok(Mutation::Rejected(rejection)),
        };

        let now = now_ms();
        let next = Player {
            progress,
            updated_at: next_updated_at(current.updated_at, now),
            sync_status: SyncStatus::Pending,
            telemetry: current.telemetry,
        };

        store_player(&tx, &next)?;
        enqueue(
            &tx,
            &OutboxPayload::UpsertPlayer(PlayerPayload::from(&next)),
            now,
        )?;
        tx.commit()?;

        Ok(Mutation::Applied(next))
    }
}
