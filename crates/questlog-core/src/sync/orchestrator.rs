//! One-cycle sync driver: push tasks, push player, pull tasks, pull player.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::models::{OutboxStatus, RecordKind};
use crate::services::LocalStore;
use crate::state::SyncPhase;
use crate::util::{compact_text, now_ms};
use crate::{Error, Result};

use super::classify::{classify_error, SyncErrorKind};
use super::pull::pull;
use super::push::push;
use super::{RemoteBackend, SyncCredentials};

pub const MERGE_NOTE: &str =
    "Progress from another device was newer and replaced the progress on this device.";
pub const IN_PROGRESS_MESSAGE: &str = "sync already in progress";
pub const AUTH_REQUIRED_MESSAGE: &str = "sign in again to resume sync";

/// In-memory sync state; never persisted
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub consecutive_errors: u32,
    pub auth_required: bool,
    pub pending_merge_note: Option<String>,
}

/// Result of one `sync_now` call
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub ok: bool,
    pub error_type: Option<SyncErrorKind>,
    pub error_message: Option<String>,
    pub merge_note: Option<String>,
}

impl SyncOutcome {
    fn success(merge_note: Option<String>) -> Self {
        Self {
            ok: true,
            merge_note,
            ..Self::default()
        }
    }

    fn failure(error_type: Option<SyncErrorKind>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_type,
            error_message: Some(message.into()),
            merge_note: None,
        }
    }
}

/// Read-only view for status displays
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub pending_count: usize,
    pub error_count: usize,
    pub auth_required: bool,
    pub consecutive_errors: u32,
    pub last_sync_ok_at: Option<i64>,
    pub last_sync_error_at: Option<i64>,
    pub last_sync_error_message: Option<String>,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    store: LocalStore,
    state: Mutex<SyncState>,
    in_flight: AtomicBool,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            state: Mutex::new(SyncState::default()),
            in_flight: AtomicBool::new(false),
            phase: watch::Sender::new(SyncPhase::Idle),
        }
    }

    /// Build for a store that may hold entries frozen by an earlier process;
    /// if so, start halted until `reset_auth_required`.
    pub async fn restore(store: LocalStore) -> Result<Self> {
        let frozen = store.count_outbox_auth_required().await?;
        let orchestrator = Self::new(store);
        if frozen > 0 {
            tracing::info!("{frozen} outbox entries await re-authentication");
            orchestrator.state.lock().await.auth_required = true;
            orchestrator.set_phase(SyncPhase::Halted);
        }
        Ok(orchestrator)
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    pub async fn state(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    pub async fn consecutive_errors(&self) -> u32 {
        self.state.lock().await.consecutive_errors
    }

    pub async fn is_auth_required(&self) -> bool {
        self.state.lock().await.auth_required
    }

    /// Run one full cycle. Failures land in the outcome, never in `Err`.
    pub async fn sync_now(&self, credentials: &SyncCredentials) -> SyncOutcome {
        let Some((remote, user_id)) = credentials.resolve() else {
            tracing::debug!("No remote credentials; staying offline");
            return SyncOutcome::success(None);
        };

        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!("Sync requested while a cycle is running");
            return SyncOutcome::failure(None, IN_PROGRESS_MESSAGE);
        };

        if self.state.lock().await.auth_required {
            self.set_phase(SyncPhase::Halted);
            return SyncOutcome::failure(Some(SyncErrorKind::Auth), AUTH_REQUIRED_MESSAGE);
        }

        let result = self.run_cycle(remote, user_id).await;
        match result {
            Ok(merge_note) => self.finish_success(merge_note).await,
            Err(error) => self.finish_failure(&error).await,
        }
    }

    async fn run_cycle(
        &self,
        remote: &dyn RemoteBackend,
        user_id: &str,
    ) -> Result<Option<String>> {
        for kind in [RecordKind::Tasks, RecordKind::Player] {
            self.set_phase(SyncPhase::Pushing(kind));
            let report = push(&self.store, remote, user_id, kind).await?;
            if report.sent > 0 {
                tracing::debug!("Pushed {} {} changes", report.sent, kind.as_str());
            }
        }

        self.set_phase(SyncPhase::Pulling(RecordKind::Tasks));
        pull(&self.store, remote, user_id, RecordKind::Tasks).await?;

        self.set_phase(SyncPhase::Pulling(RecordKind::Player));
        let report = pull(&self.store, remote, user_id, RecordKind::Player).await?;

        Ok((report.applied > 0).then(|| MERGE_NOTE.to_string()))
    }

    async fn finish_success(&self, merge_note: Option<String>) -> SyncOutcome {
        {
            let mut state = self.state.lock().await;
            state.consecutive_errors = 0;
            if let Some(note) = &merge_note {
                state.pending_merge_note = Some(note.clone());
            }
        }

        if let Err(error) = self.store.record_sync_success(now_ms()).await {
            tracing::warn!("Failed to record sync success: {error}");
        }
        self.set_phase(SyncPhase::Idle);
        tracing::info!("Sync cycle completed");
        SyncOutcome::success(merge_note)
    }

    async fn finish_failure(&self, error: &Error) -> SyncOutcome {
        let kind = classify_error(error);
        let message = compact_text(&error.to_string());

        if kind == SyncErrorKind::Auth {
            self.state.lock().await.auth_required = true;
            match self.store.flag_outbox_auth_required().await {
                Ok(flagged) => tracing::debug!("Froze {flagged} outbox entries"),
                Err(store_error) => {
                    tracing::warn!("Failed to freeze outbox entries: {store_error}");
                }
            }
            self.set_phase(SyncPhase::Halted);
            tracing::warn!("Sync halted until re-authentication: {message}");
        } else {
            let errors = {
                let mut state = self.state.lock().await;
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                state.consecutive_errors
            };
            self.set_phase(SyncPhase::Idle);
            tracing::warn!("Sync cycle failed ({kind}, {errors} in a row): {message}");
        }

        if let Err(store_error) = self.store.record_sync_failure(now_ms(), &message).await {
            tracing::warn!("Failed to record sync failure: {store_error}");
        }

        SyncOutcome::failure(Some(kind), message)
    }

    /// Counters and telemetry for display; does not modify anything.
    pub async fn snapshot(&self) -> Result<SyncSnapshot> {
        let state = self.state().await;
        let pending_count = self.store.count_outbox(OutboxStatus::Pending).await?;
        let error_count = self.store.count_outbox(OutboxStatus::Failed).await?;
        let telemetry = self.store.get_player().await?.telemetry;

        Ok(SyncSnapshot {
            pending_count,
            error_count,
            auth_required: state.auth_required,
            consecutive_errors: state.consecutive_errors,
            last_sync_ok_at: telemetry.last_sync_ok_at,
            last_sync_error_at: telemetry.last_sync_error_at,
            last_sync_error_message: telemetry.last_sync_error_message,
        })
    }

    /// Resume after the user signed in again.
    pub async fn reset_auth_required(&self) {
        {
            let mut state = self.state.lock().await;
            state.auth_required = false;
            state.consecutive_errors = 0;
        }

        match self.store.clear_outbox_auth_required().await {
            Ok(released) => tracing::info!("Sync resumed; released {released} outbox entries"),
            Err(error) => tracing::warn!("Failed to release frozen outbox entries: {error}"),
        }

        if self.phase() == SyncPhase::Halted {
            self.set_phase(SyncPhase::Idle);
        }
    }

    /// One-shot read of the "remote overwrote local" note
    pub async fn take_merge_note(&self) -> Option<String> {
        self.state.lock().await.pending_merge_note.take()
    }

    /// Drop all in-memory state.
    pub async fn reset_state(&self) {
        *self.state.lock().await = SyncState::default();
        self.set_phase(SyncPhase::Idle);
    }
}
