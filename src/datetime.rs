use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// サーバーが返すタイムスタンプのうち、タイムゾーンを持たない形式。
const SERVER_NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// テスト時に利用するモック時間を取得する。
#[cfg(test)]
pub mod mock_datetime {
    use std::cell::RefCell;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時間を取得する。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().as_ref().cloned().unwrap_or_else(Utc::now))
    }

    /// モック時間を設定する。
    pub fn set_mock_time(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    /// モック時間を指定したミリ秒だけ進める。
    pub fn advance_mock_time(millis: i64) {
        let next = now() + chrono::Duration::milliseconds(millis);
        set_mock_time(next);
    }

    // 設定したモック時間をクリアする。
    pub fn clear_mock_time() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_datetime::now;

/// 現在時刻をUNIXエポックからのミリ秒で取得する。
///
/// 経過時間の計算はすべてこの値を基準に行う。
pub fn now_ms() -> i64 {
    now().timestamp_millis()
}

/// サーバーから受け取ったタイムスタンプをパースする。
///
/// RFC 3339形式と`YYYY-MM-DD HH:MM:SS`形式を受け付ける。
/// タイムゾーンを持たない形式はUTCとして扱う。
pub fn parse_server_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.to_utc());
    }

    let naive = NaiveDateTime::parse_from_str(s, SERVER_NAIVE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("Failed to parse timestamp: {}", s))?;

    Ok(naive.and_utc())
}

/// サーバーへ送信する形式 (`YYYY-MM-DD HH:MM:SS`) に変換する。
pub fn format_server_timestamp(datetime: &DateTime<Utc>) -> String {
    datetime.format(SERVER_NAIVE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use rstest::rstest;

    use super::{format_server_timestamp, mock_datetime, parse_server_timestamp};

    /// 何も設定しない場合は、現在時間が取得できることを確認する。
    ///
    ///  - 現在時刻での比較を行なっているため、ミリ秒単位まで比較するとテストが失敗する可能性があり、秒単位で比較している。
    #[test]
    fn test_now() {
        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    /// モック時間を設定した時に、その時間が取得できることを確認する。
    #[test]
    fn test_now_specific_datetime() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );

        assert_eq!(mock_datetime::now().to_rfc3339(), datetime);
        mock_datetime::clear_mock_time();
    }

    /// モック時間を進めた時に、その分だけ時間が進むことを確認する。
    #[test]
    fn test_advance_mock_time() {
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        mock_datetime::advance_mock_time(65_000);

        assert_eq!(
            mock_datetime::now(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 5).unwrap()
        );
        mock_datetime::clear_mock_time();
    }

    /// モック時間をリセットした時に、現在時間が取得できることを確認する。
    #[test]
    fn test_now_after_clear_mock_time() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );
        mock_datetime::clear_mock_time();

        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    #[rstest]
    #[case::rfc3339("2024-03-01T10:00:00+00:00")]
    #[case::rfc3339_offset("2024-03-01T12:00:00+02:00")]
    #[case::naive_space("2024-03-01 10:00:00")]
    #[case::naive_t("2024-03-01T10:00:00")]
    fn test_parse_server_timestamp(#[case] input: &str) {
        assert_eq!(
            parse_server_timestamp(input).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_format_server_timestamp() {
        let datetime = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();

        assert_eq!(format_server_timestamp(&datetime), "2024-03-01 09:05:07");
    }

    #[test]
    fn test_parse_server_timestamp_invalid() {
        assert!(parse_server_timestamp("yesterday").is_err());
    }
}
