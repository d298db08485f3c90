use crate::error::SyncError;
use crate::models::SearchRecord;
use crate::traits::SearchIndex;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Index jobs are asynchronous server-side tasks; large upserts can take
/// minutes to process, hence the generous default.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct MeilisearchIndex {
    client: Client,
    endpoint: String,
    index_uid: String,
    api_key: Option<String>,
    task_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TaskHandle {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    code: String,
    #[serde(default)]
    message: String,
}

impl MeilisearchIndex {
    pub fn new(
        endpoint: impl Into<String>,
        index_uid: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            index_uid: index_uid.into(),
            api_key,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Creates the index with `id` as primary key and applies the settings
    /// the query side relies on. Safe to call on every boot: an already
    /// existing index is not an error.
    pub async fn ensure_index(&self) -> Result<(), SyncError> {
        let response = self
            .authorized(self.client.post(format!("{}/indexes", self.endpoint)))
            .json(&json!({"uid": self.index_uid, "primaryKey": "id"}))
            .send()
            .await?;
        let task_uid = enqueued_task(response).await?;
        let task = self.wait_for_task(task_uid).await?;
        if task.status != "succeeded"
            && task
                .error
                .as_ref()
                .map_or(true, |error| error.code != "index_already_exists")
        {
            return Err(task_failure(task_uid, task));
        }

        let response = self
            .authorized(self.client.patch(format!(
                "{}/indexes/{}/settings",
                self.endpoint, self.index_uid
            )))
            .json(&json!({
                "filterableAttributes": ["item_id", "record_type", "tags", "metadata.type"],
                "typoTolerance": {"enabled": false},
            }))
            .send()
            .await?;
        let task_uid = enqueued_task(response).await?;
        self.expect_success(task_uid).await
    }

    async fn expect_success(&self, task_uid: u64) -> Result<(), SyncError> {
        let task = self.wait_for_task(task_uid).await?;
        if task.status == "succeeded" {
            Ok(())
        } else {
            Err(task_failure(task_uid, task))
        }
    }

    async fn wait_for_task(&self, task_uid: u64) -> Result<TaskStatus, SyncError> {
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let response = self
                .authorized(
                    self.client
                        .get(format!("{}/tasks/{}", self.endpoint, task_uid)),
                )
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(SyncError::BackendResponse {
                    backend: "meilisearch".to_string(),
                    details: response.status().to_string(),
                });
            }

            let task: TaskStatus = response.json().await?;
            match task.status.as_str() {
                "succeeded" | "failed" | "canceled" => return Ok(task),
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(SyncError::TaskTimeout {
                    task_uid,
                    seconds: self.task_timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

async fn enqueued_task(response: reqwest::Response) -> Result<u64, SyncError> {
    if !response.status().is_success() {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        return Err(SyncError::BackendResponse {
            backend: "meilisearch".to_string(),
            details: format!(
                "{status}: {}",
                body.pointer("/message").and_then(Value::as_str).unwrap_or("")
            ),
        });
    }

    let handle: TaskHandle = response.json().await?;
    Ok(handle.task_uid)
}

fn task_failure(task_uid: u64, task: TaskStatus) -> SyncError {
    let message = task
        .error
        .map(|error| format!("{} ({})", error.message, error.code))
        .unwrap_or_default();
    SyncError::TaskFailed {
        task_uid,
        status: task.status,
        message,
    }
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    async fn upsert(&self, records: &[SearchRecord]) -> Result<(), SyncError> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(self.client.post(format!(
                "{}/indexes/{}/documents",
                self.endpoint, self.index_uid
            )))
            .query(&[("primaryKey", "id")])
            .json(records)
            .send()
            .await?;
        let task_uid = enqueued_task(response).await?;
        self.expect_success(task_uid).await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SyncError> {
        if ids.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(self.client.post(format!(
                "{}/indexes/{}/documents/delete-batch",
                self.endpoint, self.index_uid
            )))
            .json(ids)
            .send()
            .await?;
        let task_uid = enqueued_task(response).await?;
        self.expect_success(task_uid).await
    }
}
