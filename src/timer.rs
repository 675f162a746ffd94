//! ストップウォッチの状態遷移。
//!
//! 状態と入力イベントから、次の状態と画面・保存領域への作用を計算するだけで、
//! 通信や描画は行わない。作用の適用は`tracker`モジュールが担当する。

use crate::error::TrackerError;
use crate::format::{format_elapsed, ZERO_CLOCK};
use crate::store::ActiveSession;
use crate::time_entry::{EntryId, TaskId};

/// 計測中のtime entryの情報。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    /// サーバーが開始を受け付けるまでは`None`。
    pub entry_id: Option<EntryId>,
    pub task_id: Option<TaskId>,
    pub title: String,
}

/// タイマーの状態。
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        session: Session,
        /// 経過時間の計算基準 (UNIXエポックからのミリ秒)。
        start_instant_ms: i64,
    },
    Paused {
        session: Session,
        elapsed_ms: i64,
    },
}

/// 状態遷移を引き起こすイベント。
#[derive(Clone, Debug, PartialEq)]
pub enum TimerEvent {
    Start {
        task_id: Option<TaskId>,
        title: String,
        now_ms: i64,
    },
    EntryStarted {
        entry_id: EntryId,
    },
    StartFailed,
    Pause {
        now_ms: i64,
    },
    Resume {
        now_ms: i64,
    },
    Stop,
    Hydrate {
        record: ActiveSession,
        now_ms: i64,
    },
}

/// 入力欄とボタンの表示状態。
#[derive(Clone, Debug, PartialEq)]
pub struct Controls {
    pub input_enabled: bool,
    pub input_text: String,
    pub input_task_id: Option<TaskId>,
    pub start_visible: bool,
    pub pause_visible: bool,
    pub resume_visible: bool,
    pub stop_visible: bool,
}

impl Controls {
    pub fn idle() -> Self {
        Self {
            input_enabled: true,
            input_text: String::new(),
            input_task_id: None,
            start_visible: true,
            pause_visible: false,
            resume_visible: false,
            stop_visible: false,
        }
    }

    fn running(session: &Session) -> Self {
        Self {
            input_enabled: false,
            input_text: session.title.clone(),
            input_task_id: session.task_id,
            start_visible: false,
            pause_visible: true,
            resume_visible: false,
            stop_visible: true,
        }
    }

    fn paused(session: &Session) -> Self {
        Self {
            pause_visible: false,
            resume_visible: true,
            ..Self::running(session)
        }
    }
}

/// 状態遷移に伴って適用する作用。
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// 1秒ごとの表示更新を開始する。既存のものは先に止める。
    StartTick { start_instant_ms: i64 },
    CancelTick,
    Paint(String),
    Controls(Controls),
    SaveSession(ActiveSession),
    ClearSession,
    /// 一覧の"Track"操作をすべて有効化・無効化する。
    TrackActions { enabled: bool },
}

impl TimerState {
    /// 計測中または一時停止中であれば`true`を返す。
    pub fn is_active(&self) -> bool {
        !matches!(self, TimerState::Idle)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { session, .. } | TimerState::Paused { session, .. } => {
                Some(session)
            }
        }
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        self.session().and_then(|session| session.entry_id)
    }

    /// `now_ms`時点の経過時間を返す。一時停止中は停止時点の値を返す。
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        match self {
            TimerState::Idle => 0,
            TimerState::Running {
                start_instant_ms, ..
            } => (now_ms - start_instant_ms).max(0),
            TimerState::Paused { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    pub fn controls(&self) -> Controls {
        match self {
            TimerState::Idle => Controls::idle(),
            TimerState::Running { session, .. } => Controls::running(session),
            TimerState::Paused { session, .. } => Controls::paused(session),
        }
    }

    /// イベントを適用し、次の状態と作用を返す。
    ///
    /// 現在の状態で受け付けられないイベントは`TrackerError`を返し、状態は変わらない。
    pub fn apply(&self, event: TimerEvent) -> Result<(TimerState, Vec<Effect>), TrackerError> {
        match (self, event) {
            (
                TimerState::Idle,
                TimerEvent::Start {
                    task_id,
                    title,
                    now_ms,
                },
            ) => {
                let next = TimerState::Running {
                    session: Session {
                        entry_id: None,
                        task_id,
                        title,
                    },
                    start_instant_ms: now_ms,
                };
                let effects = vec![
                    Effect::Paint(ZERO_CLOCK.to_string()),
                    Effect::StartTick {
                        start_instant_ms: now_ms,
                    },
                    Effect::Controls(next.controls()),
                    Effect::TrackActions { enabled: false },
                ];
                Ok((next, effects))
            }
            (_, TimerEvent::Start { .. }) => Err(TrackerError::TimerAlreadyRunning),

            (
                TimerState::Running {
                    session,
                    start_instant_ms,
                },
                TimerEvent::EntryStarted { entry_id },
            ) if session.entry_id.is_none() => {
                let session = Session {
                    entry_id: Some(entry_id),
                    ..session.clone()
                };
                let record = ActiveSession {
                    entry_id,
                    start_time_ms: *start_instant_ms,
                    task_id: session.task_id,
                    task_title: session.title.clone(),
                    paused_elapsed_ms: None,
                };
                let next = TimerState::Running {
                    session,
                    start_instant_ms: *start_instant_ms,
                };
                Ok((next, vec![Effect::SaveSession(record)]))
            }
            (_, TimerEvent::EntryStarted { .. }) => Err(TrackerError::NotRunning),

            (TimerState::Running { session, .. }, TimerEvent::StartFailed)
                if session.entry_id.is_none() =>
            {
                Ok((TimerState::Idle, reset_effects()))
            }
            (_, TimerEvent::StartFailed) => Err(TrackerError::NotRunning),

            (TimerState::Running { session, .. }, TimerEvent::Pause { now_ms }) => {
                let entry_id = session.entry_id.ok_or(TrackerError::NoActiveEntry)?;
                let elapsed_ms = self.elapsed_ms(now_ms);
                let record = ActiveSession {
                    entry_id,
                    start_time_ms: now_ms - elapsed_ms,
                    task_id: session.task_id,
                    task_title: session.title.clone(),
                    paused_elapsed_ms: Some(elapsed_ms),
                };
                let next = TimerState::Paused {
                    session: session.clone(),
                    elapsed_ms,
                };
                let effects = vec![
                    Effect::CancelTick,
                    Effect::Paint(format_elapsed(elapsed_ms)),
                    Effect::Controls(next.controls()),
                    Effect::SaveSession(record),
                ];
                Ok((next, effects))
            }
            (_, TimerEvent::Pause { .. }) => Err(TrackerError::NotRunning),

            (
                TimerState::Paused {
                    session,
                    elapsed_ms,
                },
                TimerEvent::Resume { now_ms },
            ) => {
                let entry_id = session.entry_id.ok_or(TrackerError::NoActiveEntry)?;
                let start_instant_ms = now_ms - elapsed_ms;
                let record = ActiveSession {
                    entry_id,
                    start_time_ms: start_instant_ms,
                    task_id: session.task_id,
                    task_title: session.title.clone(),
                    paused_elapsed_ms: None,
                };
                let next = TimerState::Running {
                    session: session.clone(),
                    start_instant_ms,
                };
                let effects = vec![
                    Effect::Paint(format_elapsed(*elapsed_ms)),
                    Effect::StartTick { start_instant_ms },
                    Effect::Controls(next.controls()),
                    Effect::SaveSession(record),
                ];
                Ok((next, effects))
            }
            (_, TimerEvent::Resume { .. }) => Err(TrackerError::NotPaused),

            (TimerState::Idle, TimerEvent::Stop) => Err(TrackerError::NotRunning),
            (_, TimerEvent::Stop) => {
                if self.entry_id().is_none() {
                    return Err(TrackerError::NoActiveEntry);
                }
                Ok((TimerState::Idle, reset_effects()))
            }

            (TimerState::Idle, TimerEvent::Hydrate { record, now_ms }) => {
                let session = Session {
                    entry_id: Some(record.entry_id),
                    task_id: record.task_id,
                    title: record.task_title,
                };
                let (next, mut effects) = match record.paused_elapsed_ms {
                    Some(elapsed_ms) => (
                        TimerState::Paused {
                            session,
                            elapsed_ms,
                        },
                        vec![Effect::Paint(format_elapsed(elapsed_ms))],
                    ),
                    None => (
                        TimerState::Running {
                            session,
                            start_instant_ms: record.start_time_ms,
                        },
                        vec![
                            Effect::Paint(format_elapsed(now_ms - record.start_time_ms)),
                            Effect::StartTick {
                                start_instant_ms: record.start_time_ms,
                            },
                        ],
                    ),
                };
                effects.push(Effect::Controls(next.controls()));
                effects.push(Effect::TrackActions { enabled: false });
                Ok((next, effects))
            }
            (_, TimerEvent::Hydrate { .. }) => Err(TrackerError::TimerAlreadyRunning),
        }
    }
}

/// 待機状態に戻す作用。
fn reset_effects() -> Vec<Effect> {
    vec![
        Effect::CancelTick,
        Effect::Paint(ZERO_CLOCK.to_string()),
        Effect::Controls(Controls::idle()),
        Effect::ClearSession,
        Effect::TrackActions { enabled: true },
    ]
}
