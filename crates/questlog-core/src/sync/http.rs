//! PostgREST-style HTTP backend (`{base}/rest/v1/tasks`, `{base}/rest/v1/players`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::{PlayerPayload, PlayerProgress, TaskId, TaskPayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

use super::{RemoteBackend, RemoteError, RemoteTask};

const REST_PATH: &str = "/rest/v1";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Clone)]
pub struct HttpRemoteBackend {
    rest_url: String,
    api_key: String,
    access_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteBackend")
            .field("rest_url", &self.rest_url)
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let rest_url = normalize_rest_url(base_url.into())?;
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| Error::InvalidInput("API key must not be empty".to_string()))?;
        let access_token = normalize_text_option(Some(access_token.into()))
            .ok_or_else(|| Error::InvalidInput("access token must not be empty".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("HTTP client setup failed: {error}")))?;

        Ok(Self {
            rest_url,
            api_key,
            access_token,
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
    }

    async fn send(
        &self,
        builder: RequestBuilder,
    ) -> std::result::Result<reqwest::Response, RemoteError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::http(status.as_u16(), parse_api_error(status, &body)))
    }
}

#[derive(Serialize)]
struct TaskRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    task: &'a TaskPayload,
}

#[derive(Serialize)]
struct PlayerRow<'a> {
    user_id: &'a str,
    progress: &'a PlayerProgress,
    updated_at: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

#[async_trait]
impl RemoteBackend for HttpRemoteBackend {
    async fn upsert_task(
        &self,
        user_id: &str,
        task: &TaskPayload,
    ) -> std::result::Result<(), RemoteError> {
        let rows = [TaskRow { user_id, task }];
        let request = self
            .client
            .post(self.table_url("tasks"))
            .query(&[("on_conflict", "id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(&rows);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_task(&self, user_id: &str, id: TaskId) -> std::result::Result<(), RemoteError> {
        let request = self.client.delete(self.table_url("tasks")).query(&[
            ("id", format!("eq.{id}")),
            ("user_id", format!("eq.{user_id}")),
        ]);
        self.send(request).await?;
        Ok(())
    }

    async fn upsert_player(
        &self,
        user_id: &str,
        player: &PlayerPayload,
    ) -> std::result::Result<(), RemoteError> {
        let rows = [PlayerRow {
            user_id,
            progress: &player.progress,
            updated_at: player.updated_at,
        }];
        let request = self
            .client
            .post(self.table_url("players"))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(&rows);
        self.send(request).await?;
        Ok(())
    }

    async fn fetch_tasks_since(
        &self,
        user_id: &str,
        since: Option<i64>,
    ) -> std::result::Result<Vec<RemoteTask>, RemoteError> {
        let request = self
            .client
            .get(self.table_url("tasks"))
            .query(&task_query(user_id, since));
        let response = self.send(request).await?;
        response
            .json::<Vec<RemoteTask>>()
            .await
            .map_err(|error| RemoteError::message(format!("invalid tasks payload: {error}")))
    }

    async fn fetch_player(
        &self,
        user_id: &str,
    ) -> std::result::Result<Option<PlayerPayload>, RemoteError> {
        let request = self.client.get(self.table_url("players")).query(&[
            ("user_id", format!("eq.{user_id}")),
            ("limit", "1".to_string()),
        ]);
        let response = self.send(request).await?;
        let rows = response
            .json::<Vec<PlayerPayload>>()
            .await
            .map_err(|error| RemoteError::message(format!("invalid player payload: {error}")))?;

        Ok(rows.into_iter().next())
    }
}

fn task_query(user_id: &str, since: Option<i64>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("user_id", format!("eq.{user_id}")),
        ("order", "server_seq.asc".to_string()),
    ];
    if let Some(since) = since {
        query.push(("server_seq", format!("gt.{since}")));
    }
    query
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        RemoteError::network(format!("Failed to fetch: {error}"))
    } else {
        RemoteError::message(error.to_string())
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error).or(payload.msg) {
            return compact_text(&message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(trimmed)
    }
}

fn normalize_rest_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("remote URL must not be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(Error::InvalidInput(
            "remote URL must include http:// or https://".to_string(),
        ));
    }

    let url = url.trim_end_matches('/');
    if url.ends_with(REST_PATH) {
        Ok(url.to_string())
    } else {
        Ok(format!("{url}{REST_PATH}"))
    }
}
