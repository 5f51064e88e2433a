//! Background loop that runs sync cycles on the backoff cadence.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::classify::{backoff_interval, MAX_INTERVAL};
use super::{SyncCredentials, SyncOrchestrator};

/// Handle to a spawned sync loop
pub struct SyncScheduler {
    trigger: Arc<Notify>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Start looping on the current tokio runtime; the first cycle runs immediately.
    pub fn spawn(orchestrator: Arc<SyncOrchestrator>, credentials: SyncCredentials) -> Self {
        let trigger = Arc::new(Notify::new());
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            orchestrator,
            credentials,
            Arc::clone(&trigger),
            stop_rx,
        ));

        Self {
            trigger,
            stop,
            handle,
        }
    }

    /// Ask for a cycle now instead of waiting out the interval.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop scheduling and wait for the loop; a running cycle finishes first.
    pub async fn stop(self) {
        self.stop.send_replace(true);
        if let Err(error) = self.handle.await {
            tracing::warn!("Sync scheduler ended abnormally: {error}");
        }
    }
}

async fn run_loop(
    orchestrator: Arc<SyncOrchestrator>,
    credentials: SyncCredentials,
    trigger: Arc<Notify>,
    mut stop: watch::Receiver<bool>,
) {
    tracing::info!("Sync scheduler started");
    loop {
        if *stop.borrow() {
            break;
        }

        let outcome = orchestrator.sync_now(&credentials).await;
        if let Some(message) = outcome.error_message.as_deref() {
            tracing::debug!("Scheduled sync did not complete: {message}");
        }

        let delay = if orchestrator.is_auth_required().await {
            MAX_INTERVAL
        } else {
            backoff_interval(orchestrator.consecutive_errors().await)
        };
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = trigger.notified() => {
                tracing::debug!("Sync triggered manually");
            }
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Sync scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::services::LocalStore;
    use crate::sync::testing::{MockRemote, FETCH_PLAYER};
    use crate::sync::{RemoteBackend, RemoteError};
    use std::time::Duration;

    fn setup() -> (Arc<SyncOrchestrator>, Arc<MockRemote>, SyncCredentials) {
        let store = LocalStore::open_in_memory(&StoreConfig::new("device-a")).unwrap();
        let remote = Arc::new(MockRemote::default());
        let client: Arc<dyn RemoteBackend> = remote.clone();
        (
            Arc::new(SyncOrchestrator::new(store)),
            remote,
            SyncCredentials::new(client, "user-1"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_base_interval() {
        let (orchestrator, remote, credentials) = setup();
        let scheduler = SyncScheduler::spawn(orchestrator, credentials);

        tokio::time::sleep(Duration::from_secs(31)).await;
        scheduler.stop().await;

        // cycles at 0s, 15s and 30s
        assert_eq!(remote.call_count(FETCH_PLAYER), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_after_repeated_failures() {
        let (orchestrator, remote, credentials) = setup();
        remote.fail_always(FETCH_PLAYER, RemoteError::http(503, "unavailable"));
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), credentials);

        // 0s (1 error), 15s (2 errors), 45s (3 errors), 105s
        tokio::time::sleep(Duration::from_secs(100)).await;
        scheduler.stop().await;

        assert_eq!(remote.call_count(FETCH_PLAYER), 3);
        assert_eq!(orchestrator.consecutive_errors().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_runs_a_cycle_early() {
        let (orchestrator, remote, credentials) = setup();
        let scheduler = SyncScheduler::spawn(orchestrator, credentials);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.call_count(FETCH_PLAYER), 1);

        scheduler.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.stop().await;

        assert_eq!(remote.call_count(FETCH_PLAYER), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn halted_scheduler_makes_no_network_calls() {
        let (orchestrator, remote, credentials) = setup();
        remote.fail_always(FETCH_PLAYER, RemoteError::http(401, "expired"));
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), credentials);

        tokio::time::sleep(Duration::from_secs(120)).await;
        scheduler.stop().await;

        assert!(orchestrator.is_auth_required().await);
        assert_eq!(remote.call_count(FETCH_PLAYER), 1);
    }
}
