//! ローカルゲートウェイ設定
//!
//! 環境変数から待受ポート、APIキーと使用量プランを読み込む。
//! - PORT: 待受ポート（デフォルト: 8080）
//! - API_KEY: x-api-keyとして要求する値（必須）
//! - RATE_LIMIT / BURST_LIMIT / DAILY_QUOTA: 使用量プラン（デフォルト: 100 / 200 / 1000）

use std::num::NonZeroU32;

use thiserror::Error;
use webhook::infrastructure::WebhookConfigError;
use webhook::infrastructure::config::{get_optional_string, parse_env_or};

use crate::throttle::{DEFAULT_BURST_LIMIT, DEFAULT_QUOTA_LIMIT, DEFAULT_RATE_LIMIT, UsagePlan};

/// ポート環境変数名
pub const PORT_ENV: &str = "PORT";

/// デフォルトのポート
pub const DEFAULT_PORT: u16 = 8080;

/// APIキー環境変数名
pub const API_KEY_ENV: &str = "API_KEY";

/// レート環境変数名
pub const RATE_LIMIT_ENV: &str = "RATE_LIMIT";

/// バースト環境変数名
pub const BURST_LIMIT_ENV: &str = "BURST_LIMIT";

/// 日次クォータ環境変数名
pub const DAILY_QUOTA_ENV: &str = "DAILY_QUOTA";

/// ゲートウェイ設定のエラー型
#[derive(Debug, Error, PartialEq)]
pub enum GatewayConfigError {
    /// 必須の環境変数が設定されていない
    #[error("必須の環境変数が設定されていません: {0}")]
    MissingEnvVar(String),

    /// 不正な値
    #[error(transparent)]
    InvalidValue(#[from] WebhookConfigError),
}

/// ゲートウェイ設定
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    port: u16,
    api_key: String,
    usage_plan: UsagePlan,
}

impl GatewayConfig {
    /// 環境変数から設定を読み込み
    pub fn from_env() -> Result<Self, GatewayConfigError> {
        let port = parse_env_or(PORT_ENV, DEFAULT_PORT)?;

        let api_key = get_optional_string(API_KEY_ENV)
            .ok_or_else(|| GatewayConfigError::MissingEnvVar(API_KEY_ENV.to_string()))?;

        // NonZeroU32のパースで0は不正値として扱われる
        let rate_limit: NonZeroU32 = parse_env_or(RATE_LIMIT_ENV, DEFAULT_RATE_LIMIT)?;
        let burst_limit: NonZeroU32 = parse_env_or(BURST_LIMIT_ENV, DEFAULT_BURST_LIMIT)?;
        let quota_limit: NonZeroU32 = parse_env_or(DAILY_QUOTA_ENV, DEFAULT_QUOTA_LIMIT)?;

        Ok(Self {
            port,
            api_key,
            usage_plan: UsagePlan {
                rate_limit,
                burst_limit,
                quota_limit,
            },
        })
    }

    /// 待受ポート
    pub fn port(&self) -> u16 {
        self.port
    }

    /// APIキーを取得
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// 使用量プランを取得
    pub fn usage_plan(&self) -> UsagePlan {
        self.usage_plan
    }
}
