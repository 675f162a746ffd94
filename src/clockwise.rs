use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::time_entry::{
    ApiMessage, AvailableTask, CreateTaskRequest, CreateTaskResponse, EntryId, EntryUpdate,
    SessionSummary, StartEntryRequest, StartEntryResponse, StopEntryResponse, Task, TaskId,
    TimeEntry,
};

/// ClockWiseサーバーのtime entry関連APIを表すtrait。
///
/// 失敗したリクエストはすべて`Err`として返し、リトライは行わない。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClockwiseRepository: Send + Sync {
    /// まだtime entryを持たないタスクの一覧を取得する。
    async fn list_available_tasks(&self) -> Result<Vec<AvailableTask>>;

    /// トラッキング画面からタスクを作成し、払い出されたIDを返す。
    async fn create_task(&self, title: &str, user_id: Option<i64>) -> Result<TaskId>;

    /// time entryを開始し、払い出されたIDを返す。
    ///
    /// `task_id`が`None`の場合はタイトルなしのtime entryになる。
    async fn start_entry(&self, task_id: Option<TaskId>) -> Result<EntryId>;

    async fn pause_entry(&self, entry_id: EntryId) -> Result<ApiMessage>;

    async fn resume_entry(&self, entry_id: EntryId) -> Result<ApiMessage>;

    async fn stop_entry(&self, entry_id: EntryId) -> Result<StopEntryResponse>;

    async fn fetch_entry(&self, entry_id: EntryId) -> Result<TimeEntry>;

    async fn fetch_task(&self, task_id: TaskId) -> Result<Task>;

    /// 直近のセッション一覧を取得する。
    async fn list_latest_sessions(&self) -> Result<Vec<SessionSummary>>;

    async fn delete_entry(&self, entry_id: EntryId) -> Result<ApiMessage>;

    /// time entryの開始・終了時刻を修正する。
    async fn update_entry(&self, entry_id: EntryId, update: &EntryUpdate) -> Result<ApiMessage>;
}

/// ClockWise APIと通信するためのクライアント。
///
/// # Examples
///
/// ```ignore
/// let client = ClockwiseClient::with_base_url("http://localhost:5000");
/// let sessions = client.list_latest_sessions().await?;
/// ```
pub struct ClockwiseClient {
    client: Client,
    api_url: String,
}

impl ClockwiseClient {
    /// 設定から新しい`ClockwiseClient`を返す。
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.base_url)
    }

    /// 指定したベースURLに対する`ClockwiseClient`を返す。
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: format!("{}/api", base_url.trim_end_matches('/')),
        }
    }

    /// リクエストを送信し、JSONのレスポンスをデシリアライズする。
    ///
    /// 2xx以外のステータスはエラーとして扱う。
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, call_name: &str) -> Result<T> {
        let body = request
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to send {} request to ClockWise API at {}",
                    call_name, self.api_url
                )
            })?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", call_name))?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {} response", call_name))?;

        Ok(body)
    }
}

#[async_trait]
impl ClockwiseRepository for ClockwiseClient {
    async fn list_available_tasks(&self) -> Result<Vec<AvailableTask>> {
        let request = self
            .client
            .get(format!("{}/time_entries/available-tasks", self.api_url));
        let tasks: Vec<AvailableTask> = self.send(request, "list available tasks").await?;
        info!("length of available tasks: {}", tasks.len());

        Ok(tasks)
    }

    async fn create_task(&self, title: &str, user_id: Option<i64>) -> Result<TaskId> {
        let request = self
            .client
            .post(format!("{}/tasks", self.api_url))
            .json(&CreateTaskRequest {
                title,
                created_from_tracking: true,
                user_id,
            });
        let response: CreateTaskResponse = self.send(request, "create task").await?;
        debug!("create task: {:?}", response.message);

        Ok(response.task_id)
    }

    async fn start_entry(&self, task_id: Option<TaskId>) -> Result<EntryId> {
        let request = self
            .client
            .post(format!("{}/time_entries/start", self.api_url))
            .json(&StartEntryRequest { task_id });
        let response: StartEntryResponse = self.send(request, "start entry").await?;
        debug!("start entry: {:?}", response.message);

        Ok(response.time_entry_id)
    }

    async fn pause_entry(&self, entry_id: EntryId) -> Result<ApiMessage> {
        let request = self
            .client
            .post(format!("{}/time_entries/pause/{}", self.api_url, entry_id));
        self.send(request, "pause entry").await
    }

    async fn resume_entry(&self, entry_id: EntryId) -> Result<ApiMessage> {
        let request = self
            .client
            .post(format!("{}/time_entries/resume/{}", self.api_url, entry_id));
        self.send(request, "resume entry").await
    }

    async fn stop_entry(&self, entry_id: EntryId) -> Result<StopEntryResponse> {
        let request = self
            .client
            .post(format!("{}/time_entries/stop/{}", self.api_url, entry_id));
        self.send(request, "stop entry").await
    }

    async fn fetch_entry(&self, entry_id: EntryId) -> Result<TimeEntry> {
        let request = self
            .client
            .get(format!("{}/time_entries/{}", self.api_url, entry_id));
        self.send(request, "fetch entry").await
    }

    async fn fetch_task(&self, task_id: TaskId) -> Result<Task> {
        let request = self.client.get(format!("{}/tasks/{}", self.api_url, task_id));
        self.send(request, "fetch task").await
    }

    async fn list_latest_sessions(&self) -> Result<Vec<SessionSummary>> {
        let request = self
            .client
            .get(format!("{}/time_entries/latest_sessions", self.api_url));
        let sessions: Vec<SessionSummary> = self.send(request, "list latest sessions").await?;
        info!("length of latest sessions: {}", sessions.len());

        Ok(sessions)
    }

    async fn delete_entry(&self, entry_id: EntryId) -> Result<ApiMessage> {
        let request = self
            .client
            .delete(format!("{}/time_entries/{}", self.api_url, entry_id));
        self.send(request, "delete entry").await
    }

    async fn update_entry(&self, entry_id: EntryId, update: &EntryUpdate) -> Result<ApiMessage> {
        let request = self
            .client
            .put(format!("{}/time_entries/{}", self.api_url, entry_id))
            .json(update);
        self.send(request, "update entry").await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::{ClockwiseClient, ClockwiseRepository};
    use crate::time_entry::EntryUpdate;

    #[tokio::test]
    async fn test_create_task_sends_tracking_flag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/tasks")
            .match_body(Matcher::Json(json!({
                "title": "Write report",
                "created_from_tracking": true,
                "user_id": 7,
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "message": "created", "task_id": 42}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());
        let task_id = client.create_task("Write report", Some(7)).await.unwrap();

        assert_eq!(task_id, 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_task_omits_missing_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/tasks")
            .match_body(Matcher::Json(json!({
                "title": "Write report",
                "created_from_tracking": true,
            })))
            .with_status(201)
            .with_body(r#"{"success": true, "task_id": 3}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());

        assert_eq!(client.create_task("Write report", None).await.unwrap(), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_start_entry_untitled_sends_null_task() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/time_entries/start")
            .match_body(Matcher::Json(json!({ "task_id": null })))
            .with_status(200)
            .with_body(r#"{"success": true, "message": "started", "time_entry_id": 900}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());

        assert_eq!(client.start_entry(None).await.unwrap(), 900);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stop_entry_reads_duration() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/time_entries/stop/900")
            .with_status(200)
            .with_body(r#"{"success": true, "message": "stopped", "duration_minutes": 1.5}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&format!("{}/", server.url()));
        let response = client.stop_entry(900).await.unwrap();

        assert!(response.success);
        assert_eq!(response.duration_minutes, Some(1.5));
    }

    #[tokio::test]
    async fn test_pause_entry_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/time_entries/pause/5")
            .with_status(500)
            .with_body(r#"{"success": false}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());
        let result = client.pause_entry(5).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_latest_sessions_partial_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/time_entries/latest_sessions")
            .with_status(200)
            .with_body(
                json!([
                    {
                        "time_entry_id": 1,
                        "task_id": 5,
                        "title": "Bug fix",
                        "project_name": "Core",
                        "start_time": "2024-03-01 10:00:00",
                        "end_time": "2024-03-01 10:30:00",
                        "duration_seconds": 1800
                    },
                    { "time_entry_id": 2, "task_id": null, "title": null }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());
        let sessions = client.list_latest_sessions().await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].project_name.as_deref(), Some("Core"));
        assert_eq!(sessions[1].task_id, None);
        assert_eq!(sessions[1].duration_seconds, None);
    }

    #[tokio::test]
    async fn test_delete_and_update_entry() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/api/time_entries/77")
            .with_status(200)
            .with_body(r#"{"success": true, "message": "deleted"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/api/time_entries/77")
            .match_body(Matcher::Json(json!({
                "start_time": "2024-03-01 10:00:00",
                "end_time": "2024-03-01 11:00:00",
                "duration_seconds": 3600,
            })))
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());
        client.delete_entry(77).await.unwrap();
        client
            .update_entry(
                77,
                &EntryUpdate {
                    start_time: "2024-03-01 10:00:00".to_string(),
                    end_time: "2024-03-01 11:00:00".to_string(),
                    duration_seconds: 3600,
                },
            )
            .await
            .unwrap();

        delete.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_entry_and_task() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/time_entries/900")
            .with_status(200)
            .with_body(
                r#"{"time_entry_id": 900, "task_id": 42, "start_time": "2024-03-01 10:00:00",
                    "end_time": "2024-03-01 10:01:10", "duration_seconds": 70}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/tasks/42")
            .with_status(200)
            .with_body(r#"{"task_id": 42, "title": "Write report", "status": "open"}"#)
            .create_async()
            .await;

        let client = ClockwiseClient::with_base_url(&server.url());
        let entry = client.fetch_entry(900).await.unwrap();
        let task = client.fetch_task(42).await.unwrap();

        assert_eq!(entry.task_id, Some(42));
        assert_eq!(entry.duration_seconds, Some(70));
        assert_eq!(task.title, "Write report");
    }
}
