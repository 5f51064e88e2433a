use std::env;
use std::path::{Path, PathBuf};

use chrono::{Days, Local, NaiveDate, Utc};
use questlog_core::models::OutboxEntry;
use questlog_core::{LocalStore, Mutation, StoreConfig, Task};
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "QUESTLOG_DB_PATH";

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub title: String,
    pub due_date: String,
    pub status: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
    pub relative_time: String,
    pub sync_status: String,
}

#[derive(Debug, Serialize)]
pub struct OutboxListItem {
    pub id: i64,
    pub outbox_type: String,
    pub status: String,
    pub created_at: i64,
    pub created_at_iso: String,
    pub retry_count: u32,
    pub auth_required: bool,
    pub last_error: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questlog")
        .join("questlog.db")
}

pub fn store_config(cli_device_id: Option<String>) -> StoreConfig {
    cli_device_id.map_or_else(StoreConfig::from_env, StoreConfig::new)
}

pub fn open_store(path: &Path, config: &StoreConfig) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(path, config)?)
}

/// Unwrap an applied mutation or surface the rejection as an error
pub fn applied<T>(result: Mutation<T>) -> Result<T, CliError> {
    match result {
        Mutation::Applied(value) => Ok(value),
        Mutation::Rejected(rejection) => Err(CliError::Rejected(rejection)),
    }
}

pub fn resolve_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ");
    let title = title.trim();
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title.to_string())
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a due day relative to `today`
pub fn parse_day(raw: &str, today: NaiveDate) -> Result<NaiveDate, CliError> {
    let value = raw.trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    };
    parsed.ok_or_else(|| CliError::InvalidDay(raw.trim().to_string()))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    tasks
        .iter()
        .map(|task| {
            let mark = if task.is_done() { "x" } else { " " };
            let short_id = task.short_id();
            let relative_time = format_relative_time(task.updated_at, now_ms);
            format!(
                "[{mark}] {short_id:<13}  {}  {:<40}  {relative_time}",
                task.due_date,
                task.title
            )
        })
        .collect()
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    let now_ms = Utc::now().timestamp_millis();
    TaskListItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        due_date: task.due_date.to_string(),
        status: task.status.as_str().to_string(),
        created_at: task.created_at,
        completed_at: task.completed_at,
        updated_at: task.updated_at,
        relative_time: format_relative_time(task.updated_at, now_ms),
        sync_status: task.sync_status.as_str().to_string(),
    }
}

pub fn outbox_to_list_item(entry: &OutboxEntry) -> OutboxListItem {
    OutboxListItem {
        id: entry.id,
        outbox_type: entry.outbox_type().as_str().to_string(),
        status: entry.status.as_str().to_string(),
        created_at: entry.created_at,
        created_at_iso: format_timestamp(entry.created_at),
        retry_count: entry.retry_count,
        auth_required: entry.auth_required,
        last_error: entry.last_error.clone(),
    }
}

pub fn format_outbox_lines(entries: &[OutboxEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let frozen = if entry.auth_required { "  [auth]" } else { "" };
            let error = entry
                .last_error
                .as_deref()
                .map(|message| format!("  {message}"))
                .unwrap_or_default();
            format!(
                "{:>5}  {:<13}  {:<7}  retries={}  {}{frozen}{error}",
                entry.id,
                entry.outbox_type().as_str(),
                entry.status.as_str(),
                entry.retry_count,
                format_timestamp(entry.created_at)
            )
        })
        .collect()
}
