use crate::datetime::parse_server_timestamp;
use crate::time_entry::SessionSummary;

/// 表示用の経過時間のゼロ値。
pub const ZERO_CLOCK: &str = "00:00:00";

/// ミリ秒を`HH:MM:SS`形式の文字列に変換する。
///
/// 1秒未満は切り捨てる。負の値は0として扱う。
/// 時間は99を超えても桁を増やして表示する。
pub fn format_elapsed(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// 直近のセッションの経過時間をミリ秒で求める。
///
/// 1. 開始・終了時刻の両方がパースできる場合はその差
/// 2. そうでなければ`duration_seconds`
/// 3. どちらもなければ0
pub fn session_duration_ms(session: &SessionSummary) -> i64 {
    let timestamps = session
        .start_time
        .as_deref()
        .zip(session.end_time.as_deref())
        .and_then(|(start, end)| {
            let start = parse_server_timestamp(start).ok()?;
            let end = parse_server_timestamp(end).ok()?;
            Some((end - start).num_milliseconds())
        });

    match (timestamps, session.duration_seconds) {
        (Some(ms), _) => ms,
        (None, Some(seconds)) => seconds * 1000,
        (None, None) => 0,
    }
}
