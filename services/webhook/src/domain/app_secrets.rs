// アプリケーションシークレット
//
// Secrets Managerに保存されたJSONシークレット
// （anthropic_api_key, db_password）を型安全に保持する。
// 値がログに出ないよう、Debug出力はマスクする。

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Anthropic APIキーのJSONキー名
pub const ANTHROPIC_API_KEY_FIELD: &str = "anthropic_api_key";

/// DBパスワードのJSONキー名
pub const DB_PASSWORD_FIELD: &str = "db_password";

/// シークレットのパースエラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppSecretsError {
    /// JSONとして解釈できない
    #[error("シークレットのJSONパースに失敗しました: {0}")]
    InvalidJson(String),

    /// 必須キーがない、または文字列でない
    #[error("シークレットに必須キーがありません: {0}")]
    MissingField(String),

    /// バイナリシークレットがUTF-8でない
    #[error("バイナリシークレットがUTF-8ではありません")]
    InvalidUtf8,
}

/// アプリケーションシークレット
#[derive(Clone, PartialEq, Eq)]
pub struct AppSecrets {
    pub anthropic_api_key: String,
    pub db_password: String,
}

impl AppSecrets {
    /// 明示的な値で作成
    pub fn new(anthropic_api_key: impl Into<String>, db_password: impl Into<String>) -> Self {
        Self {
            anthropic_api_key: anthropic_api_key.into(),
            db_password: db_password.into(),
        }
    }

    /// SecretString（JSON文字列）からパース
    ///
    /// 未知のキーは無視する。
    pub fn from_secret_string(secret: &str) -> Result<Self, AppSecretsError> {
        let value: Value =
            serde_json::from_str(secret).map_err(|e| AppSecretsError::InvalidJson(e.to_string()))?;

        let field = |name: &str| -> Result<String, AppSecretsError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AppSecretsError::MissingField(name.to_string()))
        };

        Ok(Self {
            anthropic_api_key: field(ANTHROPIC_API_KEY_FIELD)?,
            db_password: field(DB_PASSWORD_FIELD)?,
        })
    }

    /// SecretBinaryからパース
    ///
    /// SDKはBase64デコード済みのバイト列を返すため、UTF-8として読んでから
    /// 文字列形式と同じ手順でパースする。
    pub fn from_secret_binary(secret: &[u8]) -> Result<Self, AppSecretsError> {
        let text = std::str::from_utf8(secret).map_err(|_| AppSecretsError::InvalidUtf8)?;
        Self::from_secret_string(text)
    }

    /// ログ用のキー名一覧（値は含めない）
    pub fn keys(&self) -> Vec<&'static str> {
        vec![ANTHROPIC_API_KEY_FIELD, DB_PASSWORD_FIELD]
    }
}

impl fmt::Debug for AppSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSecrets")
            .field(ANTHROPIC_API_KEY_FIELD, &"***")
            .field(DB_PASSWORD_FIELD, &"***")
            .finish()
    }
}
