use std::io;

use questlog_core::sync::SyncErrorKind;
use questlog_core::Rejection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] questlog_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No task title provided")]
    EmptyTitle,
    #[error("Invalid day '{0}': use today, tomorrow, yesterday or YYYY-MM-DD")]
    InvalidDay(String),
    #[error("Not applied: {0}")]
    Rejected(#[from] Rejection),
    #[error("Sync failed ({kind}): {message}")]
    SyncFailed {
        kind: SyncErrorKind,
        message: String,
    },
    #[error("Sync is not configured. Set {0} to enable `questlog sync`.")]
    SyncNotConfigured(String),
}
