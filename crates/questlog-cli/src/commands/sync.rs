use std::sync::Arc;

use questlog_core::sync::SyncErrorKind;
use questlog_core::{
    LocalStore, SyncConfig, SyncCredentials, SyncOrchestrator, SyncOutcome, SyncScheduler,
    SyncSnapshot,
};

use crate::commands::common::format_timestamp;
use crate::error::CliError;

/// Credentials from the environment, failing with the missing variable names
pub fn resolve_credentials(config: &SyncConfig) -> Result<SyncCredentials, CliError> {
    if !config.is_configured() {
        return Err(CliError::SyncNotConfigured(
            config.missing_variables().join(", "),
        ));
    }
    Ok(config.credentials()?)
}

pub fn outcome_result(outcome: SyncOutcome) -> Result<Option<String>, CliError> {
    if outcome.ok {
        return Ok(outcome.merge_note);
    }
    Err(CliError::SyncFailed {
        kind: outcome.error_type.unwrap_or(SyncErrorKind::Unknown),
        message: outcome
            .error_message
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}

pub async fn run_sync(store: &LocalStore, config: &SyncConfig) -> Result<(), CliError> {
    let credentials = resolve_credentials(config)?;
    let orchestrator = SyncOrchestrator::restore(store.clone()).await?;

    let merge_note = outcome_result(orchestrator.sync_now(&credentials).await)?;
    println!("Sync completed");
    if let Some(note) = merge_note {
        println!("{note}");
    }
    Ok(())
}

pub fn format_snapshot_lines(snapshot: &SyncSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("Pending changes: {}", snapshot.pending_count),
        format!("Failed changes:  {}", snapshot.error_count),
    ];
    if snapshot.auth_required {
        lines.push("Sync halted: sign in again, then run `questlog reauth`".to_string());
    }
    lines.push(format!(
        "Last success:    {}",
        snapshot
            .last_sync_ok_at
            .map_or_else(|| "never".to_string(), format_timestamp)
    ));
    if let (Some(at), Some(message)) = (
        snapshot.last_sync_error_at,
        snapshot.last_sync_error_message.as_deref(),
    ) {
        lines.push(format!("Last error:      {} - {message}", format_timestamp(at)));
    }
    lines
}

pub async fn run_status(as_json: bool, store: &LocalStore) -> Result<(), CliError> {
    let orchestrator = SyncOrchestrator::restore(store.clone()).await?;
    let snapshot = orchestrator.snapshot().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in format_snapshot_lines(&snapshot) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_watch(store: &LocalStore, config: &SyncConfig) -> Result<(), CliError> {
    let credentials = resolve_credentials(config)?;
    let orchestrator = Arc::new(SyncOrchestrator::restore(store.clone()).await?);
    let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), credentials);

    println!("Syncing in the background; press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    scheduler.stop().await;
    if let Some(note) = orchestrator.take_merge_note().await {
        println!("{note}");
    }
    println!("Stopped");
    Ok(())
}

pub async fn run_reauth(store: &LocalStore) -> Result<(), CliError> {
    let orchestrator = SyncOrchestrator::restore(store.clone()).await?;
    orchestrator.reset_auth_required().await;
    println!("Sync resumed");
    Ok(())
}
