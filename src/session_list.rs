use anyhow::Result;
use log::debug;

use crate::error::TrackerError;
use crate::format::{format_elapsed, session_duration_ms};
use crate::store::{KeyValueStore, SessionStore};
use crate::time_entry::{EntryId, SessionSummary, TaskId};

/// タイトルを持たないtime entryの表示名。
pub const UNTITLED: &str = "Untitled";

/// 直近のセッション一覧の1行。
#[derive(Clone, Debug, PartialEq)]
pub struct EntryRow {
    pub entry_id: EntryId,
    pub task_id: Option<TaskId>,
    pub name: String,
    pub project_name: Option<String>,
    /// `HH:MM:SS`形式の経過時間。
    pub duration: String,
    /// "Track"操作が押せるかどうか。
    pub track_enabled: bool,
}

impl EntryRow {
    pub fn new(
        entry_id: EntryId,
        task_id: Option<TaskId>,
        name: &str,
        project_name: Option<String>,
        duration_ms: i64,
    ) -> Self {
        let name = match name.trim() {
            "" => UNTITLED.to_string(),
            name => name.to_string(),
        };
        Self {
            entry_id,
            task_id,
            name,
            project_name,
            duration: format_elapsed(duration_ms),
            track_enabled: true,
        }
    }

    /// サーバーのセッション情報から行を作成する。
    pub fn from_summary(session: &SessionSummary) -> Self {
        Self::new(
            session.time_entry_id,
            session.task_id,
            session.title.as_deref().unwrap_or_default(),
            session.project_name.clone(),
            session_duration_ms(session),
        )
    }

    /// タスクの詳細ページへのリンク。
    pub fn edit_link(&self) -> Option<String> {
        self.task_id.map(|task_id| format!("/time_entries?id={}", task_id))
    }
}

/// 表示中のセッション一覧。
///
/// 同じtime entry IDの行は常に1つだけになる。
#[derive(Debug, Default)]
pub struct SessionList {
    rows: Vec<EntryRow>,
}

impl SessionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 行を描画する。
    ///
    /// 同じIDの既存行と表示済みIDを先に取り除いてから末尾に追加する。
    /// タイマーが動いている場合、追加する行の"Track"操作は無効にする。
    pub fn render<K: KeyValueStore>(
        &mut self,
        mut row: EntryRow,
        timer_active: bool,
        store: &mut SessionStore<K>,
    ) -> Result<()> {
        self.rows.retain(|existing| existing.entry_id != row.entry_id);
        store.remove_known_id(row.entry_id)?;

        row.track_enabled = !timer_active;
        debug!("render entry {} ({})", row.entry_id, row.name);
        self.rows.push(row);
        Ok(())
    }

    /// 行と表示済みIDを取り除き、取り除いた行を返す。
    pub fn remove<K: KeyValueStore>(
        &mut self,
        entry_id: EntryId,
        store: &mut SessionStore<K>,
    ) -> Result<Option<EntryRow>> {
        let position = self.rows.iter().position(|row| row.entry_id == entry_id);
        let removed = position.map(|index| self.rows.remove(index));
        store.remove_known_id(entry_id)?;
        Ok(removed)
    }

    /// すべての行の"Track"操作を有効化・無効化する。
    pub fn set_track_enabled(&mut self, enabled: bool) {
        self.rows
            .iter_mut()
            .for_each(|row| row.track_enabled = enabled);
    }

    /// "Track"操作の対象行を返す。
    ///
    /// 行の有効・無効に関わらず、タイマーが動いている間は拒否する。
    pub fn track_target(
        &self,
        entry_id: EntryId,
        timer_active: bool,
    ) -> Result<&EntryRow, TrackerError> {
        if timer_active {
            return Err(TrackerError::TimerAlreadyRunning);
        }
        self.get(entry_id).ok_or(TrackerError::UnknownEntry(entry_id))
    }

    pub fn get(&self, entry_id: EntryId) -> Option<&EntryRow> {
        self.rows.iter().find(|row| row.entry_id == entry_id)
    }

    pub(crate) fn get_mut(&mut self, entry_id: EntryId) -> Option<&mut EntryRow> {
        self.rows.iter_mut().find(|row| row.entry_id == entry_id)
    }

    pub fn rows(&self) -> &[EntryRow] {
        &self.rows
    }

    /// 一覧が空であれば、"まだセッションがない"旨を表示する。
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
