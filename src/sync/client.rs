use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::collections::TaskLists;
use crate::core::task::{NewTask, ParsedTask, Task, TaskId};
use crate::error::SyncError;

/// A state-changing request the synchronizer sends after its optimistic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Complete { actual_time_min: u32 },
    ToggleMyDay,
    Delete,
}

/// Productivity summary computed by the service from completed tasks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Insights {
    pub insight: String,
    #[serde(default)]
    pub daily_summary: Option<DailySummary>,
}

/// Completed-task counts per weekday, chart-ready.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DailySummary {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dataset {
    pub data: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// The task service as seen by the synchronizer.
#[async_trait]
pub trait TaskRemote: Send + Sync {
    async fn fetch_all(&self) -> Result<TaskLists, SyncError>;

    async fn fetch_task(&self, id: TaskId) -> Result<Task, SyncError>;

    async fn create_task(&self, task: &NewTask) -> Result<Task, SyncError>;

    async fn complete_task(&self, id: TaskId, actual_time_min: u32) -> Result<(), SyncError>;

    async fn toggle_my_day(&self, id: TaskId) -> Result<(), SyncError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError>;

    async fn parse_task(&self, text: &str) -> Result<ParsedTask, SyncError>;

    async fn mutate(&self, id: TaskId, mutation: Mutation) -> Result<(), SyncError> {
        match mutation {
            Mutation::Complete { actual_time_min } => self.complete_task(id, actual_time_min).await,
            Mutation::ToggleMyDay => self.toggle_my_day(id).await,
            Mutation::Delete => self.delete_task(id).await,
        }
    }
}

/// JSON-over-HTTP client for the task service.
#[derive(Clone)]
pub struct HttpTaskClient {
    base_url: String,
    http: Client,
}

impl HttpTaskClient {
    /// `base_url` includes the API prefix, e.g. `http://10.0.0.5:5000/api/v1`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SyncError> {
        Self::new(
            &config.api_base(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Productivity insight text and the per-weekday completion chart.
    pub async fn insights(&self) -> Result<Insights, SyncError> {
        let resp = self.http.get(self.url("/insights")).send().await?;
        decode(check(resp).await?).await
    }

    /// Ask the scheduler to place pending tasks; returns every scheduled task.
    pub async fn smart_schedule(&self) -> Result<Vec<Task>, SyncError> {
        let resp = self.http.get(self.url("/smart-schedule")).send().await?;
        decode(check(resp).await?).await
    }

    /// Retrain the prediction models on completed tasks.
    pub async fn retrain(&self) -> Result<String, SyncError> {
        let resp = self.http.post(self.url("/retrain")).send().await?;
        let body: MessageBody = decode(check(resp).await?).await?;
        Ok(body.message.unwrap_or_default())
    }
}

#[async_trait]
impl TaskRemote for HttpTaskClient {
    async fn fetch_all(&self) -> Result<TaskLists, SyncError> {
        log::debug!("GET {}/tasks", self.base_url);
        let resp = self.http.get(self.url("/tasks")).send().await?;
        decode(check(resp).await?).await
    }

    async fn fetch_task(&self, id: TaskId) -> Result<Task, SyncError> {
        let resp = self.http.get(self.url(&format!("/tasks/{}", id))).send().await?;
        decode(check(resp).await?).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, SyncError> {
        log::debug!("POST {}/tasks: {}", self.base_url, task.task_name);
        let resp = self.http.post(self.url("/tasks")).json(task).send().await?;
        decode(check(resp).await?).await
    }

    async fn complete_task(&self, id: TaskId, actual_time_min: u32) -> Result<(), SyncError> {
        let body = serde_json::json!({ "actual_time_min": actual_time_min });
        let resp = self
            .http
            .put(self.url(&format!("/tasks/{}/complete", id)))
            .json(&body)
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn toggle_my_day(&self, id: TaskId) -> Result<(), SyncError> {
        let resp = self
            .http
            .post(self.url(&format!("/tasks/{}/myday", id)))
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError> {
        let resp = self
            .http
            .delete(self.url(&format!("/tasks/{}", id)))
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn parse_task(&self, text: &str) -> Result<ParsedTask, SyncError> {
        let body = serde_json::json!({ "text": text });
        let resp = self
            .http
            .post(self.url("/parse-task"))
            .json(&body)
            .send()
            .await?;
        decode(check(resp).await?).await
    }
}

/// Any non-2xx status is a rejection; the body's `error` or `message` field
/// is carried along when the server sent one.
async fn check(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });
    log::debug!("Server returned {}: {}", status, text);
    Err(SyncError::ServerRejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SyncError> {
    resp.json::<T>()
        .await
        .map_err(|e| SyncError::Transport(format!("Failed to parse response: {}", e)))
}
