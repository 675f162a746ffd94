use serde::{Deserialize, Serialize};

/// サーバーが払い出すtime entryのID。
pub type EntryId = i64;

/// タスクのID。
pub type TaskId = i64;

/// サーバーが保持するtime entry。
///
/// クライアントは必要な項目だけを参照する。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TimeEntry {
    pub time_entry_id: EntryId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

/// `GET /api/tasks/{id}`のレスポンス。
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Task {
    pub task_id: TaskId,
    pub title: String,
}

/// まだtime entryを持たないタスク。入力補完の候補になる。
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AvailableTask {
    pub task_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// `GET /api/time_entries/latest_sessions`の1要素。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub time_entry_id: EntryId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

/// 書き込み系エンドポイントが返す共通の応答。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskResponse {
    pub task_id: TaskId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartEntryResponse {
    pub time_entry_id: EntryId,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/time_entries/stop/{id}`の応答。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StopEntryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTaskRequest<'a> {
    pub title: &'a str,
    pub created_from_tracking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartEntryRequest {
    pub task_id: Option<TaskId>,
}

/// time entryの開始・終了時刻を修正するためのリクエスト。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryUpdate {
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: i64,
}
