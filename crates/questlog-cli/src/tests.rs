use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use pretty_assertions::assert_eq;
use questlog_core::sync::SyncErrorKind;
use questlog_core::{
    LocalStore, Mutation, Rejection, StoreConfig, SyncConfig, SyncOutcome, TaskStatus,
};

use crate::cli::{Cli, Commands, StatusFilter};
use crate::commands::add::run_add;
use crate::commands::common::{
    applied, format_relative_time, format_timestamp, open_store, parse_day, resolve_db_path,
    resolve_title, store_config, task_to_list_item,
};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_done, run_rename, run_reopen, run_reschedule};
use crate::commands::player::{format_player_lines, run_award, run_claim, run_spend, run_unlock};
use crate::commands::sync::{
    format_snapshot_lines, outcome_result, resolve_credentials, run_reauth, run_status, run_sync,
};
use crate::error::CliError;

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn temp_store() -> (tempfile::TempDir, LocalStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(
        &dir.path().join("questlog.db"),
        &StoreConfig::new("cli-test-device"),
    )
    .unwrap();
    (dir, store)
}

fn words(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(ToString::to_string).collect()
}

#[test]
fn parse_day_understands_relative_names() {
    let today = day("2024-03-10");
    assert_eq!(parse_day("today", today).unwrap(), today);
    assert_eq!(parse_day(" Tomorrow ", today).unwrap(), day("2024-03-11"));
    assert_eq!(parse_day("yesterday", today).unwrap(), day("2024-03-09"));
    assert_eq!(parse_day("2024-12-31", today).unwrap(), day("2024-12-31"));
}

#[test]
fn parse_day_rejects_garbage() {
    let error = parse_day(" next week ", day("2024-03-10")).unwrap_err();
    assert!(matches!(error, CliError::InvalidDay(ref raw) if raw == "next week"));
    assert!(parse_day("2024-02-30", day("2024-03-10")).is_err());
}

#[test]
fn resolve_title_joins_words_and_rejects_empty() {
    assert_eq!(
        resolve_title(&words("  write   report ")).unwrap(),
        "write report"
    );
    assert!(matches!(resolve_title(&[]), Err(CliError::EmptyTitle)));
    assert!(matches!(
        resolve_title(&[" ".to_string()]),
        Err(CliError::EmptyTitle)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 86_400_000, now), "3d ago");
    assert_eq!(format_relative_time(now + 5_000, now), "just now");
}

#[test]
fn format_timestamp_is_utc() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn resolve_db_path_prefers_cli_value() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn store_config_prefers_cli_device_id() {
    assert_eq!(
        store_config(Some("laptop".to_string())).device_id,
        "laptop"
    );
}

#[test]
fn cli_parses_add_with_due_day() {
    let cli =
        Cli::try_parse_from(["questlog", "add", "buy", "milk", "--due", "tomorrow"]).unwrap();
    match cli.command {
        Commands::Add { title, due } => {
            assert_eq!(title, words("buy milk"));
            assert_eq!(due.as_deref(), Some("tomorrow"));
        }
        _ => panic!("expected add command"),
    }
}

#[test]
fn cli_list_status_requires_due() {
    assert!(Cli::try_parse_from(["questlog", "list", "--status", "done"]).is_err());

    let cli = Cli::try_parse_from([
        "questlog", "list", "--due", "today", "--status", "pending", "--json",
    ])
    .unwrap();
    match cli.command {
        Commands::List {
            status, json, limit, ..
        } => {
            assert_eq!(status, Some(StatusFilter::Pending));
            assert_eq!(TaskStatus::from(StatusFilter::Done), TaskStatus::Done);
            assert!(json);
            assert_eq!(limit, 20);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn cli_accepts_global_db_path_after_subcommand() {
    let cli = Cli::try_parse_from(["questlog", "status", "--db-path", "/tmp/q.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/q.db")));
    assert!(matches!(cli.command, Commands::Status { json: false }));
}

#[test]
fn applied_surfaces_rejections() {
    assert_eq!(applied(Mutation::Applied(7)).unwrap(), 7);

    let rejected: Mutation<i32> = Mutation::Rejected(Rejection::AlreadyDone);
    let error = applied(rejected).unwrap_err();
    assert!(matches!(error, CliError::Rejected(Rejection::AlreadyDone)));
    assert_eq!(error.to_string(), "Not applied: task is already done");
}

#[test]
fn outcome_result_maps_failures() {
    let note = outcome_result(SyncOutcome {
        ok: true,
        merge_note: Some("merged".to_string()),
        ..SyncOutcome::default()
    })
    .unwrap();
    assert_eq!(note.as_deref(), Some("merged"));

    let error = outcome_result(SyncOutcome {
        ok: false,
        error_type: Some(SyncErrorKind::Network),
        error_message: Some("Failed to fetch".to_string()),
        merge_note: None,
    })
    .unwrap_err();
    assert_eq!(error.to_string(), "Sync failed (network): Failed to fetch");

    let error = outcome_result(SyncOutcome::default()).unwrap_err();
    assert!(matches!(
        error,
        CliError::SyncFailed {
            kind: SyncErrorKind::Unknown,
            ..
        }
    ));
}

#[test]
fn resolve_credentials_lists_missing_variables() {
    let config = SyncConfig::from_lookup(|key| {
        (key == "QUESTLOG_REMOTE_URL").then(|| "https://example.supabase.co".to_string())
    })
    .unwrap();

    let error = resolve_credentials(&config).unwrap_err();
    match error {
        CliError::SyncNotConfigured(missing) => {
            assert!(missing.contains("QUESTLOG_API_KEY"));
            assert!(missing.contains("QUESTLOG_USER_ID"));
            assert!(!missing.contains("QUESTLOG_REMOTE_URL"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn run_sync_without_configuration_fails_before_touching_store() {
    let (_dir, store) = temp_store();
    let result = run_sync(&store, &SyncConfig::default()).await;
    assert!(matches!(result, Err(CliError::SyncNotConfigured(_))));
    assert_eq!(store.recent_outbox(10).await.unwrap().len(), 0);
}

#[tokio::test]
async fn task_commands_round_trip_through_store() {
    let (_dir, store) = temp_store();

    run_add(&words("water plants"), Some("2024-05-01"), &store)
        .await
        .unwrap();
    let task = store.list_tasks(10, 0).await.unwrap().remove(0);
    assert_eq!(task.due_date, day("2024-05-01"));
    let full_id = task.id.to_string();
    let prefix = &full_id[..full_id.len() - 4];

    run_rename(prefix, &words("water the plants"), &store)
        .await
        .unwrap();
    run_reschedule(prefix, "2024-05-02", &store).await.unwrap();
    run_done(prefix, &store).await.unwrap();

    let updated = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "water the plants");
    assert_eq!(updated.due_date, day("2024-05-02"));
    assert_eq!(updated.status, TaskStatus::Done);
    assert_eq!(task_to_list_item(&updated).status, "done");

    let error = run_done(prefix, &store).await.unwrap_err();
    assert!(matches!(error, CliError::Rejected(Rejection::AlreadyDone)));

    run_reopen(prefix, &store).await.unwrap();
    run_delete(prefix, &store).await.unwrap();
    assert!(store.get_task(&task.id).await.unwrap().is_none());

    // create, rename, reschedule, done, reopen, delete
    assert_eq!(store.recent_outbox(50).await.unwrap().len(), 6);
}

#[tokio::test]
async fn add_rejects_bad_input_without_queueing() {
    let (_dir, store) = temp_store();

    assert!(matches!(
        run_add(&[], None, &store).await,
        Err(CliError::EmptyTitle)
    ));
    assert!(matches!(
        run_add(&words("x"), Some("someday"), &store).await,
        Err(CliError::InvalidDay(_))
    ));
    assert!(store.recent_outbox(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn player_commands_apply_rules() {
    let (_dir, store) = temp_store();

    run_award(100, 40, &store).await.unwrap();
    run_unlock("hat", 30, &store).await.unwrap();
    run_claim("daily", 5, &store).await.unwrap();

    let error = run_spend(500, &store).await.unwrap_err();
    assert!(matches!(
        error,
        CliError::Rejected(Rejection::InsufficientBalance { .. })
    ));
    let error = run_unlock("hat", 1, &store).await.unwrap_err();
    assert!(matches!(error, CliError::Rejected(Rejection::AlreadyOwned(_))));

    let player = store.get_player().await.unwrap();
    assert_eq!(player.progress.currency, 75);
    assert_eq!(player.progress.experience, 40);

    let lines = format_player_lines(&player);
    assert_eq!(lines[0], "Currency:   75");
    assert!(lines.iter().any(|line| line == "Items:      hat"));
    assert!(lines.iter().any(|line| line == "Rewards:    daily"));
}

#[tokio::test]
async fn status_reports_pending_changes_and_reauth_resumes() {
    let (_dir, store) = temp_store();
    run_add(&words("stretch"), None, &store).await.unwrap();

    run_status(true, &store).await.unwrap();
    run_status(false, &store).await.unwrap();

    store.flag_outbox_auth_required().await.unwrap();
    let orchestrator = questlog_core::SyncOrchestrator::restore(store.clone())
        .await
        .unwrap();
    let snapshot = orchestrator.snapshot().await.unwrap();
    assert!(snapshot.auth_required);
    assert!(format_snapshot_lines(&snapshot)
        .iter()
        .any(|line| line.starts_with("Sync halted")));

    run_reauth(&store).await.unwrap();
    assert_eq!(store.count_outbox_auth_required().await.unwrap(), 0);
}
