// Webhookレスポンスモデル
//
// GitLabに返すJSONレスポンスの構造を定義する。
// Lambdaプロキシ統合ではstatusCode/headers/bodyがそのままクライアントに返るため、
// ここで組み立てた内容がHTTPレスポンスそのものになる。

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::GitlabEventKind;

/// 成功時のメッセージ
pub const ACCEPTED_MESSAGE: &str = "Event received successfully";

/// 許可されているHTTPメソッド
pub const ALLOWED_METHOD: &str = "POST";

/// Webhookレスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    /// HTTPステータスコード
    pub status: u16,
    /// レスポンスヘッダー
    pub headers: Vec<(String, String)>,
    /// JSONボディ
    pub body: Value,
}

impl WebhookResponse {
    /// 200 OK: イベント受信成功
    ///
    /// イベント種別を判定できた場合は`event`フィールドにヘッダー名を含める。
    pub fn accepted(
        method: &str,
        event_kind: Option<&GitlabEventKind>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut body = json!({
            "message": ACCEPTED_MESSAGE,
            "method": method,
            "timestamp": format_timestamp(timestamp),
        });
        if let Some(kind) = event_kind {
            body["event"] = Value::String(kind.header_name().to_string());
        }

        Self {
            status: 200,
            headers: vec![json_content_type()],
            body,
        }
    }

    /// 405 Method Not Allowed: POST以外のメソッド
    pub fn method_not_allowed(method: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: 405,
            headers: vec![
                json_content_type(),
                ("Allow".to_string(), ALLOWED_METHOD.to_string()),
            ],
            body: json!({
                "error": "Method Not Allowed",
                "message": format!(
                    "HTTP method {} is not supported. Only POST requests are allowed.",
                    method
                ),
                "timestamp": format_timestamp(timestamp),
            }),
        }
    }

    /// ボディをコンパクトなJSON文字列にする
    pub fn body_string(&self) -> String {
        self.body.to_string()
    }

    /// ヘッダー値を取得（大文字小文字を区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn json_content_type() -> (String, String) {
    ("Content-Type".to_string(), "application/json".to_string())
}

/// RFC 3339（UTC、マイクロ秒精度）でフォーマット
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
