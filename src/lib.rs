//! ClockWiseのtime entryと同期するストップウォッチ。
//!
//! 計測中のセッションはローカルに保存し、再起動後も経過時間を引き継ぐ。

pub mod clockwise;
pub mod config;
pub mod console;
pub mod datetime;
pub mod error;
pub mod format;
pub mod session_list;
pub mod store;
pub mod suggest;
pub mod ticker;
pub mod time_entry;
pub mod timer;
pub mod tracker;
