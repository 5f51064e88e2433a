//! Inbound merge of remote changes into the local store.

use crate::db::MergeResult;
use crate::models::{RecordKind, TaskPayload};
use crate::services::LocalStore;
use crate::Result;

use super::RemoteBackend;

/// Counts from one pull
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullReport {
    pub fetched: usize,
    pub applied: usize,
    pub skipped: usize,
}

impl PullReport {
    fn tally(results: &[MergeResult]) -> Self {
        let applied = results.iter().filter(|result| result.changed()).count();
        Self {
            fetched: results.len(),
            applied,
            skipped: results.len() - applied,
        }
    }
}

/// Fetch and merge remote records of `kind`, newest-wins.
pub async fn pull(
    store: &LocalStore,
    remote: &dyn RemoteBackend,
    user_id: &str,
    kind: RecordKind,
) -> Result<PullReport> {
    match kind {
        RecordKind::Tasks => pull_tasks(store, remote, user_id).await,
        RecordKind::Player => pull_player(store, remote, user_id).await,
    }
}

async fn pull_tasks(
    store: &LocalStore,
    remote: &dyn RemoteBackend,
    user_id: &str,
) -> Result<PullReport> {
    let cursor = store.pull_cursor(RecordKind::Tasks).await?;
    let rows = remote.fetch_tasks_since(user_id, cursor).await?;
    let Some(newest) = rows.iter().map(|row| row.server_seq).max() else {
        return Ok(PullReport::default());
    };

    let tasks: Vec<TaskPayload> = rows.into_iter().map(|row| row.task).collect();
    let results = store.merge_remote_tasks(&tasks).await?;
    store.advance_pull_cursor(RecordKind::Tasks, newest).await?;

    let report = PullReport::tally(&results);
    tracing::debug!(
        "Pulled {} tasks: {} applied, {} kept local",
        report.fetched,
        report.applied,
        report.skipped
    );
    Ok(report)
}

async fn pull_player(
    store: &LocalStore,
    remote: &dyn RemoteBackend,
    user_id: &str,
) -> Result<PullReport> {
    let Some(player) = remote.fetch_player(user_id).await? else {
        return Ok(PullReport::default());
    };

    let result = store.merge_remote_player(&player).await?;
    Ok(PullReport::tally(&[result]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::{
        OutboxStatus, PlayerPayload, PlayerProgress, SyncStatus, TaskId, TaskPayload, TaskStatus,
    };
    use crate::sync::testing::{MockRemote, FETCH_PLAYER};
    use crate::sync::RemoteError;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn store() -> LocalStore {
        LocalStore::open_in_memory(&StoreConfig::new("device-a")).unwrap()
    }

    fn remote_task(title: &str, updated_at: i64) -> TaskPayload {
        TaskPayload {
            id: TaskId::new(),
            title: title.to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
            status: TaskStatus::Pending,
            created_at: 1,
            completed_at: None,
            origin_device_id: "device-b".to_string(),
            updated_at,
        }
    }

    #[tokio::test]
    async fn first_pull_fetches_everything_then_uses_cursor() {
        let store = store();
        let remote = MockRemote::default();
        remote.put_task(remote_task("one", 100));
        remote.put_task(remote_task("two", 200));

        let report = pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();
        assert_eq!(
            report,
            PullReport {
                fetched: 2,
                applied: 2,
                skipped: 0
            }
        );

        let again = pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();
        assert_eq!(again, PullReport::default());
        assert_eq!(remote.since_seen(), vec![None, Some(2)]);
    }

    #[tokio::test]
    async fn late_upload_with_old_timestamp_is_still_pulled() {
        let store = store();
        let remote = MockRemote::default();
        remote.put_task(remote_task("fresh", 10_000));
        pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();

        // edited offline on another device long ago, uploaded only now
        let late = remote_task("written offline", 500);
        remote.put_task(late.clone());

        let report = pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();
        assert_eq!(report.applied, 1);
        let local = store.get_task(&late.id).await.unwrap().unwrap();
        assert_eq!(local.title, "written offline");
        assert_eq!(remote.since_seen(), vec![None, Some(1)]);
    }

    #[tokio::test]
    async fn pulling_own_push_marks_task_synced() {
        let store = store();
        let remote = MockRemote::default();
        let task = store
            .create_task("mine", NaiveDate::from_ymd_opt(2026, 6, 2).unwrap())
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(task.sync_status, SyncStatus::Pending);
        remote.put_task(TaskPayload::from(&task));

        let report = pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();

        assert_eq!(report.skipped, 1);
        let local = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(local.sync_status, SyncStatus::Synced);
        assert_eq!(local.updated_at, task.updated_at);
    }

    #[tokio::test]
    async fn pulled_rows_are_synced_and_never_queued() {
        let store = store();
        let remote = MockRemote::default();
        let incoming = remote_task("from elsewhere", 50);
        remote.put_task(incoming.clone());

        pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();

        let local = store.get_task(&incoming.id).await.unwrap().unwrap();
        assert_eq!(local.title, "from elsewhere");
        assert_eq!(local.sync_status, SyncStatus::Synced);
        assert!(local.stable_local_id > 0);
        assert_eq!(store.count_outbox(OutboxStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn newer_local_task_is_kept() {
        let store = store();
        let remote = MockRemote::default();
        let local = store
            .create_task("local edit", NaiveDate::from_ymd_opt(2026, 6, 2).unwrap())
            .await
            .unwrap()
            .applied()
            .unwrap();
        let mut stale = TaskPayload::from(&local);
        stale.title = "stale remote".to_string();
        stale.updated_at = local.updated_at - 1;
        remote.put_task(stale);

        let report = pull(&store, &remote, "u", RecordKind::Tasks).await.unwrap();

        assert_eq!(report.skipped, 1);
        let kept = store.get_task(&local.id).await.unwrap().unwrap();
        assert_eq!(kept.title, "local edit");
    }

    #[tokio::test]
    async fn newer_remote_player_replaces_local() {
        let store = store();
        let remote = MockRemote::default();
        let local = store.award(5, 5).await.unwrap().applied().unwrap();
        remote.set_player(PlayerPayload {
            progress: PlayerProgress {
                currency: 99,
                ..PlayerProgress::default()
            },
            updated_at: local.updated_at + 1_000,
        });

        let report = pull(&store, &remote, "u", RecordKind::Player).await.unwrap();

        assert_eq!(report.applied, 1);
        let player = store.get_player().await.unwrap();
        assert_eq!(player.progress.currency, 99);
        assert_eq!(player.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn missing_remote_player_is_a_no_op() {
        let store = store();
        let remote = MockRemote::default();

        let report = pull(&store, &remote, "u", RecordKind::Player).await.unwrap();
        assert_eq!(report, PullReport::default());
        assert_eq!(remote.call_count(FETCH_PLAYER), 1);
        assert_eq!(store.pull_cursor(RecordKind::Player).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_cursor_alone() {
        let store = store();
        let remote = MockRemote::default();
        remote.fail_next(
            crate::sync::testing::FETCH_TASKS,
            RemoteError::network("Failed to fetch"),
        );

        assert!(pull(&store, &remote, "u", RecordKind::Tasks).await.is_err());
        assert_eq!(store.pull_cursor(RecordKind::Tasks).await.unwrap(), None);
    }
}
