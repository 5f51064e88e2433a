//! In-memory recording backend for sync tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{PlayerPayload, TaskId, TaskPayload};

use super::{RemoteBackend, RemoteError, RemoteTask};

pub(crate) const UPSERT_TASK: &str = "upsert_task";
pub(crate) const DELETE_TASK: &str = "delete_task";
pub(crate) const UPSERT_PLAYER: &str = "upsert_player";
pub(crate) const FETCH_TASKS: &str = "fetch_tasks";
pub(crate) const FETCH_PLAYER: &str = "fetch_player";

#[derive(Default)]
struct Inner {
    calls: Vec<&'static str>,
    tasks: HashMap<TaskId, RemoteTask>,
    last_seq: i64,
    player: Option<PlayerPayload>,
    queued_failures: HashMap<&'static str, VecDeque<RemoteError>>,
    standing_failures: HashMap<&'static str, RemoteError>,
    since_seen: Vec<Option<i64>>,
}

/// Remote that records every call and fails on demand
#[derive(Default)]
pub(crate) struct MockRemote {
    inner: Mutex<Inner>,
}

impl MockRemote {
    /// Fail the next call to `op` once
    pub(crate) fn fail_next(&self, op: &'static str, error: RemoteError) {
        self.inner
            .lock()
            .unwrap()
            .queued_failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Fail every call to `op` until cleared
    pub(crate) fn fail_always(&self, op: &'static str, error: RemoteError) {
        self.inner
            .lock()
            .unwrap()
            .standing_failures
            .insert(op, error);
    }

    pub(crate) fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.queued_failures.clear();
        inner.standing_failures.clear();
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|call| **call == op).count()
    }

    pub(crate) fn since_seen(&self) -> Vec<Option<i64>> {
        self.inner.lock().unwrap().since_seen.clone()
    }

    pub(crate) fn set_player(&self, player: PlayerPayload) {
        self.inner.lock().unwrap().player = Some(player);
    }

    pub(crate) fn player(&self) -> Option<PlayerPayload> {
        self.inner.lock().unwrap().player.clone()
    }

    /// Store a task the way the server would, stamping the next sequence
    pub(crate) fn put_task(&self, task: TaskPayload) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_seq += 1;
        let server_seq = inner.last_seq;
        inner.tasks.insert(task.id, RemoteTask { task, server_seq });
    }

    pub(crate) fn task(&self, id: TaskId) -> Option<TaskPayload> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .get(&id)
            .map(|remote| remote.task.clone())
    }

    fn record(&self, op: &'static str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(op);
        if let Some(error) = inner
            .queued_failures
            .get_mut(op)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        match inner.standing_failures.get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteBackend for MockRemote {
    async fn upsert_task(&self, _user_id: &str, task: &TaskPayload) -> Result<(), RemoteError> {
        self.record(UPSERT_TASK)?;
        self.put_task(task.clone());
        Ok(())
    }

    async fn delete_task(&self, _user_id: &str, id: TaskId) -> Result<(), RemoteError> {
        self.record(DELETE_TASK)?;
        self.inner.lock().unwrap().tasks.remove(&id);
        Ok(())
    }

    async fn upsert_player(
        &self,
        _user_id: &str,
        player: &PlayerPayload,
    ) -> Result<(), RemoteError> {
        self.record(UPSERT_PLAYER)?;
        self.set_player(player.clone());
        Ok(())
    }

    async fn fetch_tasks_since(
        &self,
        _user_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<RemoteTask>, RemoteError> {
        self.record(FETCH_TASKS)?;
        let mut inner = self.inner.lock().unwrap();
        inner.since_seen.push(since);
        let mut tasks: Vec<RemoteTask> = inner
            .tasks
            .values()
            .filter(|remote| since.is_none_or(|since| remote.server_seq > since))
            .cloned()
            .collect();
        tasks.sort_by_key(|remote| remote.server_seq);
        Ok(tasks)
    }

    async fn fetch_player(&self, _user_id: &str) -> Result<Option<PlayerPayload>, RemoteError> {
        self.record(FETCH_PLAYER)?;
        Ok(self.player())
    }
}
