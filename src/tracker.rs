use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::clockwise::ClockwiseRepository;
use crate::datetime::{format_server_timestamp, now_ms};
use crate::error::TrackerError;
use crate::format::format_elapsed;
use crate::session_list::{EntryRow, SessionList};
use crate::store::{KeyValueStore, SessionStore};
use crate::suggest::{TaskCatalog, TaskInput};
use crate::ticker::Ticker;
use crate::time_entry::{AvailableTask, EntryId, EntryUpdate, TaskId};
use crate::timer::{Controls, Effect, Session, TimerEvent, TimerState};

/// 状態遷移の結果。サーバーの応答を待ってから反映する。
type Transition = (TimerState, Vec<Effect>);

/// ストップウォッチとセッション一覧をサーバー・保存領域と同期させる。
///
/// 状態遷移はすべて`&mut self`を取るため、同じ`Tracker`で2つの遷移が同時に進むことはない。
pub struct Tracker<G: ClockwiseRepository, K: KeyValueStore> {
    gateway: G,
    store: SessionStore<K>,
    state: TimerState,
    ticker: Ticker,
    controls: Controls,
    input: TaskInput,
    list: SessionList,
    catalog: TaskCatalog,
    user_id: Option<i64>,
}

impl<G: ClockwiseRepository, K: KeyValueStore> Tracker<G, K> {
    /// 新しい`Tracker`を返す。
    ///
    /// # Arguments
    ///
    /// * `gateway` - ClockWise APIと通信するためのリポジトリ
    /// * `store` - 計測中のセッションを保存するリポジトリ
    /// * `user_id` - タスク作成時に送信するユーザーID
    pub fn new(gateway: G, store: SessionStore<K>, user_id: Option<i64>) -> Self {
        Self {
            gateway,
            store,
            state: TimerState::Idle,
            ticker: Ticker::new(),
            controls: Controls::idle(),
            input: TaskInput::default(),
            list: SessionList::new(),
            catalog: TaskCatalog::default(),
            user_id,
        }
    }

    /// 起動時の処理を行う。
    ///
    /// 保存されたセッションを復元し、直近のセッションと入力候補を取得する。
    /// 通信の失敗はログに出力するだけで、処理は続ける。
    /// tokioのランタイム上で呼び出す必要がある。
    pub async fn page_load(&mut self) -> Result<()> {
        self.hydrate().context("Failed to restore active session")?;

        if let Err(err) = self.load_latest_sessions().await {
            error!("Error loading latest sessions: {:?}", err);
        }
        if let Err(err) = self.load_available_tasks().await {
            error!("Error loading available tasks: {:?}", err);
        }

        Ok(())
    }

    /// 保存されたセッションがあれば、その経過時間から計測を再開する。
    ///
    /// 復元した場合は`true`を返す。
    /// tickのタスクを起動するため、tokioのランタイム上で呼び出す必要がある。
    pub fn hydrate(&mut self) -> Result<bool> {
        let Some(record) = self.store.load_active_session()? else {
            return Ok(false);
        };

        let entry_id = record.entry_id;
        self.dispatch(TimerEvent::Hydrate {
            record,
            now_ms: now_ms(),
        })?;
        info!("Restored active entry {}", entry_id);

        Ok(true)
    }

    /// 直近のセッションを取得して一覧に描画する。
    pub async fn load_latest_sessions(&mut self) -> Result<usize> {
        let sessions = self
            .gateway
            .list_latest_sessions()
            .await
            .context("Failed to fetch latest sessions")?;

        let timer_active = self.state.is_active();
        for session in &sessions {
            self.list
                .render(EntryRow::from_summary(session), timer_active, &mut self.store)?;
        }

        Ok(sessions.len())
    }

    /// 入力候補に使うタスクの一覧を取得する。
    pub async fn load_available_tasks(&mut self) -> Result<usize> {
        let tasks = self
            .gateway
            .list_available_tasks()
            .await
            .context("Failed to fetch tasks")?;
        self.catalog = TaskCatalog::new(tasks);

        Ok(self.catalog.len())
    }

    /// 入力欄のテキストを書き換える。
    pub fn type_text(&mut self, text: &str) {
        self.input.type_text(text);
    }

    /// 入力欄のテキストに一致する候補を返す。
    pub fn suggestions(&self) -> Vec<&AvailableTask> {
        self.catalog.suggest(&self.input.text)
    }

    /// 候補を選択し、入力欄にタイトルとタスクIDを設定する。
    pub fn select_suggestion(&mut self, task_id: TaskId) -> Result<()> {
        let task = self
            .catalog
            .find(task_id)
            .with_context(|| format!("Task {} is not in the suggestion list", task_id))?;
        self.input.select(task);
        Ok(())
    }

    /// 入力欄の内容で計測を開始する。
    pub async fn start(&mut self) -> Result<()> {
        let TaskInput { text, task_id } = self.input.clone();
        self.start_with(&text, task_id).await
    }

    /// 計測を開始する。
    ///
    /// タスクIDがなくタイトルがある場合は、先にタスクを作成する。
    /// どちらもない場合はタイトルなしのtime entryを開始する。
    pub async fn start_with(&mut self, title: &str, task_id: Option<TaskId>) -> Result<()> {
        if self.state.is_active() {
            return Err(TrackerError::TimerAlreadyRunning.into());
        }

        let title = title.trim().to_string();
        let task_id = match task_id {
            Some(task_id) => Some(task_id),
            None if !title.is_empty() => Some(
                self.gateway
                    .create_task(&title, self.user_id)
                    .await
                    .context("Failed to create task")?,
            ),
            None => None,
        };

        self.begin(title, task_id).await
    }

    async fn begin(&mut self, title: String, task_id: Option<TaskId>) -> Result<()> {
        self.dispatch(TimerEvent::Start {
            task_id,
            title,
            now_ms: now_ms(),
        })?;

        match self.gateway.start_entry(task_id).await {
            Ok(entry_id) => {
                self.dispatch(TimerEvent::EntryStarted { entry_id })?;
                info!("Started entry {} for task {:?}", entry_id, task_id);
                Ok(())
            }
            Err(err) => {
                self.dispatch(TimerEvent::StartFailed)?;
                Err(err.context("Failed to start entry"))
            }
        }
    }

    /// 計測を一時停止する。サーバーが受け付けた場合のみ状態を変える。
    pub async fn pause(&mut self) -> Result<()> {
        let transition = self.state.apply(TimerEvent::Pause { now_ms: now_ms() })?;
        let entry_id = self.state.entry_id().ok_or(TrackerError::NoActiveEntry)?;

        self.gateway
            .pause_entry(entry_id)
            .await
            .context("Failed to pause entry")?;
        self.commit(transition)?;
        info!("Paused entry {}", entry_id);

        Ok(())
    }

    /// 一時停止した計測を再開する。
    pub async fn resume(&mut self) -> Result<()> {
        let TimerState::Paused { session, .. } = &self.state else {
            return Err(TrackerError::NotPaused.into());
        };
        let entry_id = session.entry_id.ok_or(TrackerError::NoActiveEntry)?;

        self.gateway
            .resume_entry(entry_id)
            .await
            .context("Failed to resume entry")?;
        // 開始時刻はサーバーの応答後の時刻から付け替える
        self.dispatch(TimerEvent::Resume { now_ms: now_ms() })?;
        info!("Resumed entry {}", entry_id);

        Ok(())
    }

    /// 計測を終了し、一覧に追加した行を返す。
    ///
    /// time entryがまだない場合は警告を出力して何もしない。
    pub async fn stop(&mut self) -> Result<Option<EntryRow>> {
        let Some(entry_id) = self.state.entry_id() else {
            warn!("No current entry - stopping without entry");
            return Ok(None);
        };
        let elapsed_ms = self.state.elapsed_ms(now_ms());
        let session = self.state.session().cloned().unwrap_or_default();
        let transition = self.state.apply(TimerEvent::Stop)?;

        self.gateway
            .stop_entry(entry_id)
            .await
            .context("Failed to stop entry")?;

        let row = match self.finished_row(entry_id, &session, elapsed_ms).await {
            Ok(row) => Some(row),
            Err(err) => {
                error!("Failed to stop or fetch entry: {:?}", err);
                None
            }
        };

        self.commit(transition)?;
        if let Some(row) = &row {
            self.list.render(row.clone(), false, &mut self.store)?;
            self.store.add_known_id(entry_id)?;
        }
        info!("Stopped entry {} after {}", entry_id, format_elapsed(elapsed_ms));

        Ok(row)
    }

    async fn finished_row(
        &self,
        entry_id: EntryId,
        session: &Session,
        elapsed_ms: i64,
    ) -> Result<EntryRow> {
        let entry = self
            .gateway
            .fetch_entry(entry_id)
            .await
            .context("Failed to fetch entry")?;
        let name = match entry.task_id {
            Some(task_id) => {
                self.gateway
                    .fetch_task(task_id)
                    .await
                    .context("Failed to fetch task")?
                    .title
            }
            None => session.title.clone(),
        };

        Ok(EntryRow::new(
            entry_id,
            entry.task_id,
            &name,
            entry.project_name,
            elapsed_ms,
        ))
    }

    /// 一覧の行の"Track"操作から、同じタスクの計測を開始する。
    ///
    /// タイマーが動いている場合は拒否する。
    pub async fn resume_from_list(&mut self, entry_id: EntryId) -> Result<()> {
        self.list.track_target(entry_id, self.state.is_active())?;

        let entry = self
            .gateway
            .fetch_entry(entry_id)
            .await
            .context("Failed to fetch entry")?;
        let title = match entry.task_id {
            Some(task_id) => {
                self.gateway
                    .fetch_task(task_id)
                    .await
                    .context("Failed to fetch task")?
                    .title
            }
            None => entry.title.clone().unwrap_or_default(),
        };

        self.list.remove(entry_id, &mut self.store)?;
        self.begin(title, entry.task_id).await
    }

    /// time entryを削除し、一覧から取り除く。
    pub async fn delete(&mut self, entry_id: EntryId) -> Result<()> {
        self.gateway
            .delete_entry(entry_id)
            .await
            .context("Failed to delete entry")?;
        self.list.remove(entry_id, &mut self.store)?;
        info!("Deleted entry {}", entry_id);

        Ok(())
    }

    /// time entryの開始・終了時刻を修正し、一覧の経過時間を更新する。
    pub async fn edit(
        &mut self,
        entry_id: EntryId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let duration = end - start;
        if duration < chrono::Duration::zero() {
            return Err(TrackerError::InvalidRange.into());
        }

        let update = EntryUpdate {
            start_time: format_server_timestamp(&start),
            end_time: format_server_timestamp(&end),
            duration_seconds: duration.num_seconds(),
        };
        self.gateway
            .update_entry(entry_id, &update)
            .await
            .context("Error updating entry")?;

        if let Some(row) = self.list.get_mut(entry_id) {
            row.duration = format_elapsed(duration.num_milliseconds());
        }

        Ok(())
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    pub fn list(&self) -> &SessionList {
        &self.list
    }

    pub fn store(&self) -> &SessionStore<K> {
        &self.store
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// 現在表示している経過時間。
    pub fn clock_text(&self) -> String {
        self.ticker.text()
    }

    fn dispatch(&mut self, event: TimerEvent) -> Result<()> {
        let transition = self.state.apply(event)?;
        self.commit(transition)
    }

    /// 状態を更新し、作用を順に適用する。
    fn commit(&mut self, (state, effects): Transition) -> Result<()> {
        self.state = state;
        for effect in effects {
            match effect {
                Effect::StartTick { start_instant_ms } => self.ticker.start(start_instant_ms),
                Effect::CancelTick => self.ticker.cancel(),
                Effect::Paint(text) => self.ticker.paint(text),
                Effect::Controls(controls) => {
                    self.input = TaskInput {
                        text: controls.input_text.clone(),
                        task_id: controls.input_task_id,
                    };
                    self.controls = controls;
                }
                Effect::SaveSession(record) => self.store.save_active_session(&record)?,
                Effect::ClearSession => self.store.clear_active_session()?,
                Effect::TrackActions { enabled } => self.list.set_track_enabled(enabled),
            }
        }

        Ok(())
    }
}
