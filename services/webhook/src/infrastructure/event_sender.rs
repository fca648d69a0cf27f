// EventSender - スモークテスト用HTTPクライアント
//
// サンプルのGitLabイベントを送信して、デプロイ済み（またはローカル）の
// Webhookエンドポイントが期待通り応答するかを確認する。
// - API Gateway / ローカルゲートウェイ: POST /events に x-api-key 付きで送信
// - Lambda RIE: API Gatewayプロキシイベントで包んで invocations に送信

use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{GITLAB_EVENT_HEADER, GitlabEventKind};

/// RIEのデフォルト呼び出しURL
pub const DEFAULT_RIE_URL: &str = "http://localhost:9000/2015-03-31/functions/function/invocations";

/// APIキーヘッダー名
pub const API_KEY_HEADER: &str = "x-api-key";

/// リクエストタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 接続タイムアウト（秒）
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// EventSender用エラー型
#[derive(Debug, Error)]
pub enum SendError {
    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// レスポンスの形式が不正
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),
}

/// 送信結果
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// エンドポイント（またはLambda結果のstatusCode）のステータス
    pub status: u16,
    /// レスポンスボディ
    pub body: String,
}

impl SendOutcome {
    /// 2xxかどうか
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// API Gateway REST（v1）プロキシ統合のイベントを組み立てる
///
/// RIEはこの形式をそのままLambdaハンドラーに渡す。
pub fn api_gateway_proxy_event(
    method: &str,
    path: &str,
    headers: &[(String, String)],
    body: Option<&str>,
) -> Value {
    let header_map: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let multi_value_headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.clone(), json!([v])))
        .collect();

    json!({
        "resource": path,
        "path": path,
        "httpMethod": method,
        "headers": header_map,
        "multiValueHeaders": multi_value_headers,
        "queryStringParameters": null,
        "multiValueQueryStringParameters": null,
        "pathParameters": null,
        "stageVariables": null,
        "requestContext": {
            "resourceId": "123456",
            "resourcePath": path,
            "httpMethod": method,
            "requestTime": "09/Apr/2015:12:34:56 +0000",
            "requestTimeEpoch": 1428582896000u64,
            "path": format!("/prod{}", path),
            "accountId": "123456789012",
            "protocol": "HTTP/1.1",
            "stage": "prod",
            "requestId": "test-request-id",
            "identity": {
                "sourceIp": "127.0.0.1",
                "userAgent": "send_test_event"
            },
            "domainName": "1234567890.execute-api.us-east-1.amazonaws.com",
            "apiId": "1234567890"
        },
        "body": body,
        "isBase64Encoded": false
    })
}

/// スモークテスト用HTTPクライアント
#[derive(Debug, Clone)]
pub struct EventSender {
    client: Client,
}

impl EventSender {
    /// 新しいEventSenderを作成
    pub fn new() -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SendError::NetworkError(e.to_string()))?;
        Ok(Self { client })
    }

    /// API Gateway（またはローカルゲートウェイ）の /events に送信する
    ///
    /// # 引数
    /// * `url` - /events エンドポイントの完全なURL
    /// * `api_key` - x-api-key ヘッダーに設定する値
    /// * `kind` - X-Gitlab-Event ヘッダーに設定するイベント種別
    /// * `payload` - GitLabイベントのJSON
    pub async fn send_to_gateway(
        &self,
        url: &str,
        api_key: Option<&str>,
        kind: &GitlabEventKind,
        payload: &str,
    ) -> Result<SendOutcome, SendError> {
        info!(url = %url, event = kind.header_name(), "ゲートウェイにイベントを送信");

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(GITLAB_EVENT_HEADER, kind.header_name())
            .body(payload.to_string());

        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        debug!(status = status, body = %body, "ゲートウェイ応答");

        Ok(SendOutcome { status, body })
    }

    /// Lambda RIEの invocations エンドポイントにプロキシイベントを送信する
    ///
    /// RIE自体のHTTPステータスではなく、Lambdaが返した`statusCode`を結果とする。
    pub async fn invoke_rie(
        &self,
        url: &str,
        method: &str,
        kind: &GitlabEventKind,
        payload: &str,
    ) -> Result<SendOutcome, SendError> {
        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (GITLAB_EVENT_HEADER.to_string(), kind.header_name().to_string()),
        ];
        let event = api_gateway_proxy_event(method, "/events", &headers, Some(payload));

        info!(url = %url, method = %method, "RIEにプロキシイベントを送信");

        let response = self
            .client
            .post(url)
            .json(&event)
            .send()
            .await
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        let rie_status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        if !rie_status.is_success() {
            return Err(SendError::InvalidResponse(format!(
                "RIEがステータス{}を返しました: {}",
                rie_status.as_u16(),
                text
            )));
        }

        parse_lambda_result(&text)
    }
}

/// Lambdaプロキシ結果（statusCode/body）を読み取る
pub fn parse_lambda_result(text: &str) -> Result<SendOutcome, SendError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| SendError::InvalidResponse(e.to_string()))?;

    let status = value
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| SendError::InvalidResponse("statusCodeがありません".to_string()))?;

    let body = match value.get("body") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Ok(SendOutcome { status, body })
}
