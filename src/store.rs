use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
#[cfg(unix)]
use std::{io::Write, os::unix::fs::OpenOptionsExt};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::time_entry::{EntryId, TaskId};

/// 計測中のセッションを保存するキー。
pub const ACTIVE_ENTRY_KEY: &str = "clockwise_active_entry";

/// 表示済みのtime entry IDを保存するキー。
pub const ENTRY_IDS_KEY: &str = "clockwise_entry_ids";

/// 再起動をまたいで計測を続けるために保存する、計測中のセッション。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub entry_id: EntryId,
    /// 経過時間の計算基準となる開始時刻 (UNIXエポックからのミリ秒)。
    #[serde(rename = "startTime")]
    pub start_time_ms: i64,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub task_title: String,
    /// 一時停止中の場合、停止時点の経過時間 (ミリ秒)。
    #[serde(
        default,
        rename = "pausedElapsed",
        skip_serializing_if = "Option::is_none"
    )]
    pub paused_elapsed_ms: Option<i64>,
}

/// 文字列を保存するキーバリューストア。
///
/// 保存先 (ファイル、メモリ) を差し替えられるようにするためのtrait。
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// キーごとに1つのJSONファイルを作成するストア。
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// `root`ディレクトリ以下に保存する`FileStore`を返す。
    ///
    /// ディレクトリは最初の書き込み時に作成する。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

fn secure_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    #[cfg(unix)]
    {
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let value = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        secure_write(&self.path(key), value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// メモリ上に保持するストア。
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// 計測中のセッションと表示済みtime entry IDを読み書きするリポジトリ。
pub struct SessionStore<K: KeyValueStore> {
    backend: K,
}

impl<K: KeyValueStore> SessionStore<K> {
    pub fn new(backend: K) -> Self {
        Self { backend }
    }

    /// 保存されている計測中のセッションを読み込む。
    ///
    /// 壊れた値や開始時刻が正の数値でない値は、セッションなしとして扱う。
    pub fn load_active_session(&self) -> Result<Option<ActiveSession>> {
        let Some(raw) = self.backend.get(ACTIVE_ENTRY_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Option<ActiveSession>>(&raw) {
            Ok(Some(session)) if session.start_time_ms <= 0 => {
                warn!(
                    "Ignoring active session {} with start time {}",
                    session.entry_id, session.start_time_ms
                );
                Ok(None)
            }
            Ok(session) => Ok(session),
            Err(err) => {
                warn!("Ignoring unreadable active session: {}", err);
                Ok(None)
            }
        }
    }

    pub fn save_active_session(&mut self, session: &ActiveSession) -> Result<()> {
        let raw = serde_json::to_string(session).context("Failed to serialize active session")?;
        self.backend.set(ACTIVE_ENTRY_KEY, &raw)
    }

    pub fn clear_active_session(&mut self) -> Result<()> {
        self.backend.remove(ACTIVE_ENTRY_KEY)
    }

    /// 表示済みのtime entry IDを読み込む。読み込めない場合は空として扱う。
    pub fn load_known_ids(&self) -> Result<Vec<EntryId>> {
        let Some(raw) = self.backend.get(ENTRY_IDS_KEY)? else {
            return Ok(vec![]);
        };

        match serde_json::from_str::<Option<Vec<EntryId>>>(&raw) {
            Ok(ids) => Ok(ids.unwrap_or_default()),
            Err(err) => {
                warn!("Ignoring unreadable entry id list: {}", err);
                Ok(vec![])
            }
        }
    }

    /// IDを追加する。既に存在する場合は何もしない。
    pub fn add_known_id(&mut self, id: EntryId) -> Result<()> {
        let mut ids = self.load_known_ids()?;
        if !ids.contains(&id) {
            ids.push(id);
            self.save_known_ids(&ids)?;
        }
        Ok(())
    }

    pub fn remove_known_id(&mut self, id: EntryId) -> Result<()> {
        let ids: Vec<EntryId> = self
            .load_known_ids()?
            .into_iter()
            .filter(|known| *known != id)
            .collect();
        self.save_known_ids(&ids)
    }

    fn save_known_ids(&mut self, ids: &[EntryId]) -> Result<()> {
        let raw = serde_json::to_string(ids).context("Failed to serialize entry ids")?;
        self.backend.set(ENTRY_IDS_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{
        ActiveSession, FileStore, KeyValueStore, MemoryStore, SessionStore, ACTIVE_ENTRY_KEY,
        ENTRY_IDS_KEY,
    };

    fn active_session() -> ActiveSession {
        ActiveSession {
            entry_id: 900,
            start_time_ms: 1_700_000_000_000,
            task_id: Some(42),
            task_title: "Write report".to_string(),
            paused_elapsed_ms: None,
        }
    }

    #[test]
    fn test_active_session_wire_format() {
        let raw = serde_json::to_value(active_session()).unwrap();

        assert_eq!(
            raw,
            serde_json::json!({
                "entryId": 900,
                "startTime": 1_700_000_000_000i64,
                "taskId": 42,
                "taskTitle": "Write report",
            })
        );
    }

    #[test]
    fn test_active_session_round_trip_and_clear() {
        let mut store = SessionStore::new(MemoryStore::new());
        assert_eq!(store.load_active_session().unwrap(), None);

        store.save_active_session(&active_session()).unwrap();
        assert_eq!(store.load_active_session().unwrap(), Some(active_session()));

        store.clear_active_session().unwrap();
        assert_eq!(store.load_active_session().unwrap(), None);
    }

    /// 開始時刻が数値でない、または壊れた値はセッションなしとして扱う。
    #[rstest]
    #[case::non_numeric_start(r#"{"entryId": 1, "startTime": "abc", "taskId": 2, "taskTitle": "x"}"#)]
    #[case::missing_start(r#"{"entryId": 1, "taskId": 2, "taskTitle": "x"}"#)]
    #[case::zero_start(r#"{"entryId": 1, "startTime": 0, "taskId": 2, "taskTitle": "x"}"#)]
    #[case::negative_start(r#"{"entryId": 1, "startTime": -5, "taskId": 2, "taskTitle": "x"}"#)]
    #[case::broken_json("{not json")]
    #[case::null("null")]
    fn test_load_active_session_malformed(#[case] raw: &str) {
        let mut backend = MemoryStore::new();
        backend.set(ACTIVE_ENTRY_KEY, raw).unwrap();
        let store = SessionStore::new(backend);

        assert_eq!(store.load_active_session().unwrap(), None);
    }

    #[test]
    fn test_known_ids_add_remove() {
        let mut store = SessionStore::new(MemoryStore::new());

        store.add_known_id(1).unwrap();
        store.add_known_id(2).unwrap();
        store.add_known_id(1).unwrap();
        assert_eq!(store.load_known_ids().unwrap(), vec![1, 2]);

        store.remove_known_id(1).unwrap();
        assert_eq!(store.load_known_ids().unwrap(), vec![2]);
    }

    #[test]
    fn test_known_ids_unreadable() {
        let mut backend = MemoryStore::new();
        backend.set(ENTRY_IDS_KEY, "[1, \"two\"").unwrap();
        let store = SessionStore::new(backend);

        assert!(store.load_known_ids().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");

        let mut store = SessionStore::new(FileStore::new(&root));
        store.save_active_session(&active_session()).unwrap();
        store.add_known_id(77).unwrap();

        let reopened = SessionStore::new(FileStore::new(&root));
        assert_eq!(reopened.load_active_session().unwrap(), Some(active_session()));
        assert_eq!(reopened.load_known_ids().unwrap(), vec![77]);
    }

    #[test]
    fn test_file_store_remove_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileStore::new(dir.path());

        backend.remove(ACTIVE_ENTRY_KEY).unwrap();
        assert_eq!(backend.get(ACTIVE_ENTRY_KEY).unwrap(), None);
    }
}
