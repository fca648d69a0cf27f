/// Webhook Lambda設定
///
/// Lambda関数に設定される環境変数を型安全に読み込む。
/// - LOG_LEVEL: ログレベル（logging側で直接参照）
/// - SECRETS_ARN: Secrets ManagerのシークレットARN
/// - SECRETS_CACHE_TTL_SECONDS: シークレットキャッシュのTTL
use std::time::Duration;

use thiserror::Error;

/// ログレベル環境変数名
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// シークレットARN環境変数名
pub const SECRETS_ARN_ENV: &str = "SECRETS_ARN";

/// シークレットキャッシュTTL環境変数名
pub const SECRETS_CACHE_TTL_ENV: &str = "SECRETS_CACHE_TTL_SECONDS";

/// デフォルトのシークレットキャッシュTTL（秒）
pub const DEFAULT_SECRETS_CACHE_TTL_SECONDS: u64 = 300;

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq)]
pub enum WebhookConfigError {
    /// 数値として解釈できない環境変数
    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidValue { name: String, value: String },
}

/// Webhook設定
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    secrets_arn: Option<String>,
    secrets_cache_ttl: Duration,
}

impl WebhookConfig {
    /// 環境変数から設定を読み込み
    ///
    /// 空文字列の環境変数は未設定として扱う。
    /// PORTは参照しない（ローカルゲートウェイの設定）。
    pub fn from_env() -> Result<Self, WebhookConfigError> {
        let secrets_arn = get_optional_string(SECRETS_ARN_ENV);

        let ttl_seconds = parse_env_or(SECRETS_CACHE_TTL_ENV, DEFAULT_SECRETS_CACHE_TTL_SECONDS)?;

        Ok(Self {
            secrets_arn,
            secrets_cache_ttl: Duration::from_secs(ttl_seconds),
        })
    }

    /// シークレットARN（未設定ならNone）
    pub fn secrets_arn(&self) -> Option<&str> {
        self.secrets_arn.as_deref()
    }

    /// シークレットキャッシュのTTL
    pub fn secrets_cache_ttl(&self) -> Duration {
        self.secrets_cache_ttl
    }
}

/// 文字列の環境変数を読み込む（空白のみはNone扱い）
pub fn get_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 数値の環境変数を読み込む（未設定ならデフォルト、不正値はエラー）
pub fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, WebhookConfigError> {
    match get_optional_string(key) {
        Some(value) => value.parse().map_err(|_| WebhookConfigError::InvalidValue {
            name: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
