//! Outbox entries and the remote-safe payloads they carry

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ParseEnumError, Player, PlayerProgress, Task, TaskId, TaskStatus};

/// Record family an outbox entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Tasks,
    Player,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Player => "player",
        }
    }

    /// Outbox types drained when pushing this kind
    pub const fn outbox_types(self) -> &'static [OutboxType] {
        match self {
            Self::Tasks => &[OutboxType::UpsertTask, OutboxType::DeleteTask],
            Self::Player => &[OutboxType::UpsertPlayer],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation an outbox entry asks the remote backend to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxType {
    UpsertTask,
    DeleteTask,
    UpsertPlayer,
}

impl OutboxType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpsertTask => "UPSERT_TASK",
            Self::DeleteTask => "DELETE_TASK",
            Self::UpsertPlayer => "UPSERT_PLAYER",
        }
    }

    pub const fn kind(self) -> RecordKind {
        match self {
            Self::UpsertTask | Self::DeleteTask => RecordKind::Tasks,
            Self::UpsertPlayer => RecordKind::Player,
        }
    }
}

impl fmt::Display for OutboxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPSERT_TASK" => Ok(Self::UpsertTask),
            "DELETE_TASK" => Ok(Self::DeleteTask),
            "UPSERT_PLAYER" => Ok(Self::UpsertPlayer),
            other => Err(ParseEnumError::new("outbox type", other)),
        }
    }
}

/// Delivery state of an outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError::new("outbox status", other)),
        }
    }
}

/// Remote projection of a task.
///
/// Only fields the remote schema knows about; `stable_local_id` and
/// `sync_status` stay on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub id: TaskId,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub origin_device_id: String,
    pub updated_at: i64,
}

impl From<&Task> for TaskPayload {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            due_date: task.due_date,
            status: task.status,
            created_at: task.created_at,
            completed_at: task.completed_at,
            origin_device_id: task.origin_device_id.clone(),
            updated_at: task.updated_at,
        }
    }
}

/// Remote projection of a task deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDeletePayload {
    pub id: TaskId,
}

/// Remote projection of the player record, without sync telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPayload {
    pub progress: PlayerProgress,
    pub updated_at: i64,
}

impl From<&Player> for PlayerPayload {
    fn from(player: &Player) -> Self {
        Self {
            progress: player.progress.clone(),
            updated_at: player.updated_at,
        }
    }
}

/// Typed outbox payload, one variant per outbox type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxPayload {
    UpsertTask(TaskPayload),
    DeleteTask(TaskDeletePayload),
    UpsertPlayer(PlayerPayload),
}

impl OutboxPayload {
    pub const fn outbox_type(&self) -> OutboxType {
        match self {
            Self::UpsertTask(_) => OutboxType::UpsertTask,
            Self::DeleteTask(_) => OutboxType::DeleteTask,
            Self::UpsertPlayer(_) => OutboxType::UpsertPlayer,
        }
    }

    /// Serialize just the payload body for storage
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::UpsertTask(payload) => serde_json::to_string(payload),
            Self::DeleteTask(payload) => serde_json::to_string(payload),
            Self::UpsertPlayer(payload) => serde_json::to_string(payload),
        }
    }

    /// Rebuild a payload from its stored type and body
    pub fn from_parts(outbox_type: OutboxType, body: &str) -> serde_json::Result<Self> {
        Ok(match outbox_type {
            OutboxType::UpsertTask => Self::UpsertTask(serde_json::from_str(body)?),
            OutboxType::DeleteTask => Self::DeleteTask(serde_json::from_str(body)?),
            OutboxType::UpsertPlayer => Self::UpsertPlayer(serde_json::from_str(body)?),
        })
    }
}

/// A queued mutation awaiting delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: i64,
    /// Enqueue timestamp (Unix ms), defines FIFO order
    pub created_at: i64,
    pub status: OutboxStatus,
    pub payload: OutboxPayload,
    pub retry_count: u32,
    /// Frozen until the user re-authenticates
    pub auth_required: bool,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub const fn outbox_type(&self) -> OutboxType {
        self.payload.outbox_type()
    }
}
