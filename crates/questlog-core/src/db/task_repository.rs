//! Task repository implementation
//!
//! Every write runs in one transaction that reads the current row, applies
//! the change, stores it as `pending` and enqueues exactly one outbox entry.
//! A rejected change drops the transaction, leaving both the row and the
//! outbox untouched.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    OutboxPayload, SyncStatus, Task, TaskDeletePayload, TaskId, TaskPayload, TaskStatus,
};
use crate::rules::{Mutation, Rejection, RuleResult};
use crate::util::{normalize_text_option, now_ms};

use super::{enqueue, next_updated_at, parse_text};

pub(crate) const TASK_COLUMNS: &str = "id, title, due_date, status, created_at, completed_at, \
     origin_device_id, stable_local_id, updated_at, sync_status";

/// Parse a task from a database row selected with `TASK_COLUMNS`
pub(crate) fn parse_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_text(row, 0)?,
        title: row.get(1)?,
        due_date: parse_text(row, 2)?,
        status: parse_text(row, 3)?,
        created_at: row.get(4)?,
        completed_at: row.get(5)?,
        origin_device_id: row.get(6)?,
        stable_local_id: row.get::<_, Option<i64>>(7)?.unwrap_or_default(),
        updated_at: row.get(8)?,
        sync_status: parse_text(row, 9)?,
    })
}

/// Fetch a task by id on any connection or transaction
pub(crate) fn fetch_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
            params![id.as_str()],
            parse_task,
        )
        .optional()?;
    Ok(task)
}

/// Next device-local ordinal
pub(crate) fn next_stable_local_id(conn: &Connection) -> Result<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(stable_local_id), 0) + 1 FROM tasks",
        [],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn normalize_title(title: &str) -> RuleResult<String> {
    normalize_text_option(Some(title.to_string()))
        .ok_or_else(|| Rejection::InvalidInput("title must not be empty".to_string()))
}

/// Trait for task storage operations
pub trait TaskRepository {
    /// Create a new task for the given day
    fn create(&self, title: &str, due_date: NaiveDate) -> Result<Mutation<Task>>;

    /// Get a task by ID
    fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// List tasks, most recently updated first
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Task>>;

    /// List tasks due on a day, optionally filtered by status
    fn list_for_day(&self, due_date: NaiveDate, status: Option<TaskStatus>)
        -> Result<Vec<Task>>;

    /// List task IDs starting with the given prefix
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Change a task's title
    fn rename(&self, id: &TaskId, title: &str) -> Result<Mutation<Task>>;

    /// Move a task to another day
    fn reschedule(&self, id: &TaskId, due_date: NaiveDate) -> Result<Mutation<Task>>;

    /// Mark a pending task done
    fn complete(&self, id: &TaskId) -> Result<Mutation<Task>>;

    /// Mark a done task pending again
    fn reopen(&self, id: &TaskId) -> Result<Mutation<Task>>;

    /// Remove a task
    fn delete(&self, id: &TaskId) -> Result<Mutation<TaskId>>;
}

/// `SQLite` implementation of `TaskRepository`
pub struct SqliteTaskRepository<'a> {
    conn: &'a Connection,
    device_id: &'a str,
}

impl<'a> SqliteTaskRepository<'a> {
    /// Create a new repository with the given connection.
    ///
    /// `device_id` is stamped on tasks created through this repository.
    pub const fn new(conn: &'a Connection, device_id: &'a str) -> Self {
        Self { conn, device_id }
    }

    /// Apply a change to an existing task and queue its upsert
    fn mutate<F>(&self, id: &TaskId, change: F) -> Result<Mutation<Task>>
    where
        F: FnOnce(&Task, i64) -> RuleResult<Task>,
    {
        let tx = self.conn.unchecked_transaction()?;

        let Some(current) = fetch_task(&tx, id)? else {
            return Ok(Mutation::Rejected(Rejection::NotFound(id.to_string())));
        };

        let now = now_ms();
        let mut next = match change(&current, now) {
            Ok(next) => next,
            Err(rejection) => return Ok(Mutation::Rejected(rejection)),
        };
        next.updated_at = next_updated_at(current.updated_at, now);
        next.sync_status = SyncStatus::Pending;

        tx.execute(
            "UPDATE tasks
             SET title = ?, due_date = ?, status = ?, completed_at = ?, updated_at = ?, sync_status = ?
             WHERE id = ?",
            params![
                next.title,
                next.due_date.to_string(),
                next.status.as_str(),
                next.completed_at,
                next.updated_at,
                next.sync_status.as_str(),
                next.id.as_str()
            ],
        )?;
        enqueue(
            &tx,
            &OutboxPayload::UpsertTask(TaskPayload::from(&next)),
            now,
        )?;
        tx.commit()?;

        Ok(Mutation::Applied(next))
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create(&self, title: &str, due_date: NaiveDate) -> Result<Mutation<Task>> {
        let title = match normalize_title(title) {
            Ok(title) => title,
            Err(rejection) => return Ok(Mutation::Rejected(rejection)),
        };

        let tx = self.conn.unchecked_transaction()?;
        let now = now_ms();
        let task = Task {
            id: TaskId::new(),
            title,
            due_date,
            status: TaskStatus::Pending,
            created_at: now,
            completed_at: None,
            origin_device_id: self.device_id.to_string(),
            stable_local_id: next_stable_local_id(&tx)?,
            updated_at: now,
            sync_status: SyncStatus::Pending,
        };

        tx.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                task.id.as_str(),
                task.title,
                task.due_date.to_string(),
                task.status.as_str(),
                task.created_at,
                task.completed_at,
                task.origin_device_id,
                task.stable_local_id,
                task.updated_at,
                task.sync_status.as_str()
            ],
        )?;
        enqueue(
            &tx,
            &OutboxPayload::UpsertTask(TaskPayload::from(&task)),
            now,
        )?;
        tx.commit()?;

        tracing::debug!("Created task {}", task.id);
        Ok(Mutation::Applied(task))
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        fetch_task(self.conn, id)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks
             ORDER BY updated_at DESC
             LIMIT ? OFFSET ?"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let tasks = stmt
            .query_map(params![limit, offset], parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn list_for_day(
        &self,
        due_date: NaiveDate,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>> {
        let day = due_date.to_string();
        let tasks = if let Some(status) = status {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE due_date = ? AND status = ?
                 ORDER BY stable_local_id ASC"
            ))?;
            let tasks = stmt
                .query_map(params![day, status.as_str()], parse_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tasks
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE due_date = ?
                 ORDER BY stable_local_id ASC"
            ))?;
            let tasks = stmt
                .query_map(params![day], parse_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tasks
        };

        Ok(tasks)
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM tasks WHERE id LIKE ? || '%' ORDER BY id LIMIT ?")?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids = stmt
            .query_map(params![prefix, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn rename(&self, id: &TaskId, title: &str) -> Result<Mutation<Task>> {
        self.mutate(id, |current, _| {
            let title = normalize_title(title)?;
            if title == current.title {
                return Err(Rejection::InvalidInput("title is unchanged".to_string()));
            }
            Ok(Task {
                title,
                ..current.clone()
            })
        })
    }

    fn reschedule(&self, id: &TaskId, due_date: NaiveDate) -> Result<Mutation<Task>> {
        self.mutate(id, |current, _| {
            if current.due_date == due_date {
                return Err(Rejection::InvalidInput(
                    "task is already due on that day".to_string(),
                ));
            }
            Ok(Task {
                due_date,
                ..current.clone()
            })
        })
    }

    fn complete(&self, id: &TaskId) -> Result<Mutation<Task>> {
        self.mutate(id, |current, now| {
            if current.is_done() {
                return Err(Rejection::AlreadyDone);
            }
            Ok(Task {
                status: TaskStatus::Done,
                completed_at: Some(now),
                ..current.clone()
            })
        })
    }

    fn reopen(&self, id: &TaskId) -> Result<Mutation<Task>> {
        self.mutate(id, |current, _| {
            if !current.is_done() {
                return Err(Rejection::NotDone);
            }
            Ok(Task {
                status: TaskStatus::Pending,
                completed_at: None,
                ..current.clone()
            })
        })
    }

    fn delete(&self, id: &TaskId) -> Result<Mutation<TaskId>> {
        let tx = self.conn.unchecked_transaction()?;

        if fetch_task(&tx, id)?.is_none() {
            return Ok(Mutation::Rejected(Rejection::NotFound(id.to_string())));
        }

        tx.execute("DELETE FROM tasks WHERE id = ?", params![id.as_str()])?;
        enqueue(
            &tx,
            &OutboxPayload::DeleteTask(TaskDeletePayload { id: *id }),
            now_ms(),
        )?;
        tx.commit()?;

        Ok(Mutation::Applied(*id))
    }
}
