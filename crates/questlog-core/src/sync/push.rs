//! Outbox drain: deliver queued mutations of one record kind in FIFO order.

use crate::models::{OutboxEntry, OutboxPayload, RecordKind};
use crate::services::LocalStore;
use crate::Result;

use super::classify::{classify, SyncErrorKind};
use super::{RemoteBackend, RemoteError};

/// Counts from one drain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
}

async fn deliver(
    remote: &dyn RemoteBackend,
    user_id: &str,
    entry: &OutboxEntry,
) -> std::result::Result<(), RemoteError> {
    match &entry.payload {
        OutboxPayload::UpsertTask(task) => remote.upsert_task(user_id, task).await,
        OutboxPayload::DeleteTask(delete) => remote.delete_task(user_id, delete.id).await,
        OutboxPayload::UpsertPlayer(player) => remote.upsert_player(user_id, player).await,
    }
}

/// Push every deliverable entry of `kind`.
///
/// Auth failures freeze the whole outbox and abort. Validation failures mark
/// the entry failed and the drain moves on, but the first one is still
/// returned once the drain ends. Anything else marks the entry failed and
/// stops, since later entries may depend on it.
pub async fn push(
    store: &LocalStore,
    remote: &dyn RemoteBackend,
    user_id: &str,
    kind: RecordKind,
) -> Result<PushReport> {
    let entries = store.deliverable_outbox(kind).await?;
    if entries.is_empty() {
        return Ok(PushReport::default());
    }

    tracing::debug!("Pushing {} {} outbox entries", entries.len(), kind.as_str());
    let mut report = PushReport::default();
    let mut first_rejection: Option<RemoteError> = None;

    for entry in &entries {
        let Err(error) = deliver(remote, user_id, entry).await else {
            store.mark_outbox_sent(entry.id).await?;
            report.sent += 1;
            continue;
        };

        match classify(Some(&error)) {
            SyncErrorKind::Auth => {
                let flagged = store.flag_outbox_auth_required().await?;
                tracing::warn!(
                    "Remote rejected credentials while pushing {}: {error}; froze {flagged} outbox entries",
                    entry.outbox_type().as_str()
                );
                return Err(error.into());
            }
            SyncErrorKind::Validation => {
                store
                    .mark_outbox_failed(entry.id, &error.to_string())
                    .await?;
                report.failed += 1;
                tracing::warn!(
                    "Remote rejected outbox entry {} ({}): {error}",
                    entry.id,
                    entry.outbox_type().as_str()
                );
                first_rejection.get_or_insert(error);
            }
            SyncErrorKind::Network | SyncErrorKind::Unknown => {
                store
                    .mark_outbox_failed(entry.id, &error.to_string())
                    .await?;
                tracing::warn!(
                    "Push of outbox entry {} stopped: {error}",
                    entry.id
                );
                return Err(error.into());
            }
        }
    }

    match first_rejection {
        Some(error) => Err(error.into()),
        None => Ok(report),
    }
}
