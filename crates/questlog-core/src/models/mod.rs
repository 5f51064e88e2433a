//! Data models for Questlog

mod outbox;
mod player;
mod task;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use outbox::{
    OutboxEntry, OutboxPayload, OutboxStatus, OutboxType, PlayerPayload, RecordKind,
    TaskDeletePayload, TaskPayload,
};
pub use player::{Player, PlayerProgress, SyncTelemetry};
pub use task::{Task, TaskId, TaskStatus};

/// Failed to parse a stored enum value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Per-record sync state, local only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local change not yet confirmed by the remote backend
    #[default]
    Pending,
    /// Matches the last known remote state
    Synced,
    /// Last delivery attempt failed
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(ParseEnumError::new("sync status", other)),
        }
    }
}
