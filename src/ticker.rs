use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::debug;
use tokio::{sync::watch, task::JoinHandle};

use crate::datetime::now_ms;
use crate::format::{format_elapsed, ZERO_CLOCK};

/// 表示を更新する間隔。
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// 経過時間の表示を1秒ごとに更新するタスク。
///
/// 同時に動くタスクは常に1つだけで、`start`は既存のタスクを止めてから新しいタスクを開始する。
pub struct Ticker {
    clock: Arc<watch::Sender<String>>,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl Ticker {
    pub fn new() -> Self {
        let (clock, _) = watch::channel(ZERO_CLOCK.to_string());
        Self {
            clock: Arc::new(clock),
            handle: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `start_instant_ms`からの経過時間を表示するタスクを開始する。
    ///
    /// tokioのランタイム上で呼び出す必要がある。
    pub fn start(&mut self, start_instant_ms: i64) {
        self.cancel();

        let clock = Arc::clone(&self.clock);
        let ticks = Arc::clone(&self.ticks);
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // 最初のtickは即座に完了するため読み捨てる
            interval.tick().await;
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::Relaxed);
                clock.send_replace(format_elapsed(now_ms() - start_instant_ms));
            }
        }));
        debug!("tick started from {}", start_instant_ms);
    }

    /// 動いているタスクを止める。動いていなければ何もしない。
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("tick cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// 表示を直ちに書き換える。
    pub fn paint(&self, text: String) {
        self.clock.send_replace(text);
    }

    /// 現在表示している経過時間。
    pub fn text(&self) -> String {
        self.clock.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.clock.subscribe()
    }

    /// これまでに実行したtickの回数。
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
