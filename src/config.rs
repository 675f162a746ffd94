use std::{env, path::PathBuf};

use anyhow::{Context, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// 環境変数から読み込む設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// ClockWiseサーバーのベースURL (`CLOCKWISE_BASE_URL`)。
    pub base_url: String,
    /// タスク作成時に送信するユーザーID (`CLOCKWISE_USER_ID`)。
    pub user_id: Option<i64>,
    /// 計測中のセッションを保存するディレクトリ (`CLOCKWISE_DATA_DIR`)。
    pub data_dir: PathBuf,
}

impl Config {
    /// 環境変数から設定を読み込む。
    ///
    /// `CLOCKWISE_USER_ID`が数値でない場合はエラーを返す。
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("CLOCKWISE_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let user_id = lookup("CLOCKWISE_USER_ID")
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .with_context(|| format!("CLOCKWISE_USER_ID must be a number: {}", raw))
            })
            .transpose()?;

        let data_dir = match lookup("CLOCKWISE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .context("Cannot determine data directory")?
                .join("clockwise"),
        };

        Ok(Self {
            base_url,
            user_id,
            data_dir,
        })
    }
}
