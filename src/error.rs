use thiserror::Error;

use crate::time_entry::EntryId;

/// タイマーの状態と矛盾する操作を表すエラー。
#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("Please stop the current timer before starting a new one.")]
    TimerAlreadyRunning,
    #[error("no timer running")]
    NotRunning,
    #[error("timer is not paused")]
    NotPaused,
    #[error("timer has no time entry yet")]
    NoActiveEntry,
    #[error("entry {0} is not in the session list")]
    UnknownEntry(EntryId),
    #[error("end time must not be before start time")]
    InvalidRange,
}
