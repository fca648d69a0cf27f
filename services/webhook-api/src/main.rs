//! ローカル開発用のAPI Gateway互換HTTPサーバー
//!
//! 本バイナリは以下の機能を提供する:
//! - GitLab Webhookの受信 (POST /events)
//! - ヘルスチェック (GET /health)
//!
//! API Gatewayの前段処理（x-api-key認証、使用量プラン）を再現したうえで、
//! Lambdaと同じWebhookHandlerにリクエストを渡す。
//! 未定義のリソース・メソッドはキーの有無に関係なく
//! 403 Missing Authentication Tokenを返す。

mod auth;
mod config;
mod error;
mod throttle;

pub use auth::{AuthConfig, api_key_middleware};
pub use config::{GatewayConfig, GatewayConfigError};
pub use error::ApiError;
pub use throttle::{ThrottleState, UsagePlan, throttle_middleware};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use webhook::application::WebhookHandler;
use webhook::domain::{WebhookRequest, WebhookResponse};
use webhook::infrastructure::{
    AwsSecretsOps, CachedSecretsOps, SecretsOps, WebhookConfig, init_logging,
};

/// 共有されるWebhookハンドラー
pub type SharedHandler = Arc<WebhookHandler<Box<dyn SecretsOps>>>;

/// アプリケーション状態
///
/// ルーター全体で共有される状態を保持する。
#[derive(Clone)]
pub struct AppState {
    /// Webhookハンドラー（Lambdaと共通）
    pub handler: SharedHandler,
}

/// ヘルスチェックエンドポイント
///
/// サーバーの死活確認用。認証不要。
async fn health() -> &'static str {
    "OK"
}

/// Webhook受信エンドポイント (POST /events)
///
/// # Returns
/// - 200 OK: イベント受信
/// - 500 Internal Server Error: レスポンス構築失敗
async fn receive_event(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = to_webhook_request(&method, &uri, &headers, &body);
    let response = state.handler.handle(&request).await;

    tracing::info!(status = response.status, "Webhookレスポンス送信");

    match into_http_response(response) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "レスポンス構築エラー");
            ApiError::internal_error("Internal server error").into_response()
        }
    }
}

/// 存在しないリソース・メソッドへのリクエスト
///
/// API Gateway REST APIは未定義のパスやメソッドに403 Missing Authentication Tokenを返す。
async fn missing_resource(method: Method, uri: Uri) -> ApiError {
    tracing::warn!(method = %method, path = %uri.path(), "未定義のリソース");
    ApiError::missing_authentication_token()
}

/// axumのリクエスト要素をWebhookRequestに変換する
///
/// ボディはUTF-8として解釈し、不正なバイト列は置換文字に変換する。
/// 値がUTF-8でないヘッダーは捨てる。
fn to_webhook_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> WebhookRequest {
    let mut request = WebhookRequest::new(method.as_str(), uri.path());

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request.insert_header(name.as_str(), value);
        }
    }

    if !body.is_empty() {
        request.body = Some(String::from_utf8_lossy(body).into_owned());
    }

    request
}

/// WebhookResponseをaxumのレスポンスに変換する
fn into_http_response(response: WebhookResponse) -> Result<Response, axum::http::Error> {
    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(response.body_string()))
}

/// ルーターを構築する
///
/// 認証と使用量プランはPOST /eventsだけに適用する（認証が先）。
/// /healthと未定義のリソース・メソッドはどちらのミドルウェアも通らない。
///
/// # Arguments
/// * `auth_config` - 認証設定
/// * `throttle_state` - 使用量プランの状態
/// * `handler` - Webhookハンドラー
pub fn create_router(
    auth_config: AuthConfig,
    throttle_state: ThrottleState,
    handler: SharedHandler,
) -> Router {
    let state = AppState { handler };

    Router::new()
        .route("/health", get(health))
        .route(
            "/events",
            post(receive_event)
                .route_layer(middleware::from_fn_with_state(
                    throttle_state,
                    throttle_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    auth_config,
                    api_key_middleware,
                ))
                .fallback(missing_resource),
        )
        .fallback(missing_resource)
        // リクエストトレーシングレイヤー（method, path, status, latencyを自動記録）
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// シャットダウンシグナルを待機する
///
/// SIGTERMまたはCtrl+C (SIGINT) を待機し、いずれかを受信したらリターンする。
/// シグナルハンドラーの登録に失敗した場合はログを出してそのシグナルを待たない。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C シグナルハンドラーの登録に失敗しました");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM シグナルハンドラーの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    // Windows等の非Unix環境ではSIGTERMは利用不可
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C (SIGINT) を受信しました。graceful shutdownを開始します");
        }
        _ = terminate => {
            tracing::info!("SIGTERM を受信しました。graceful shutdownを開始します");
        }
    }
}

/// メイン関数
///
/// ログを初期化し、HTTPサーバーを起動する。
///
/// # 環境変数
/// - `API_KEY`: x-api-keyとして要求する値（必須）
/// - `PORT`: リッスンポート（デフォルト: 8080）
/// - `SECRETS_ARN`: Secrets ManagerのシークレットARN
/// - `SECRETS_CACHE_TTL_SECONDS`: シークレットのキャッシュ秒数（デフォルト: 300）
/// - `RATE_LIMIT` / `BURST_LIMIT` / `DAILY_QUOTA`: 使用量プラン（デフォルト: 100 / 200 / 1000）
/// - `LOG_LEVEL` / `RUST_LOG`: ログレベル（デフォルト: info）
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();

    tracing::info!("Webhook API サーバーを起動します");

    let webhook_config = WebhookConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Webhook設定読み込み失敗");
        e
    })?;
    let gateway_config = GatewayConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "ゲートウェイ設定読み込み失敗");
        e
    })?;

    let plan = gateway_config.usage_plan();
    tracing::info!(
        rate_limit = plan.rate_limit.get(),
        burst_limit = plan.burst_limit.get(),
        daily_quota = plan.quota_limit.get(),
        secrets_arn = webhook_config.secrets_arn().unwrap_or("-"),
        "ゲートウェイ設定を読み込みました"
    );

    let secrets_ops: Box<dyn SecretsOps> = Box::new(CachedSecretsOps::new(
        AwsSecretsOps::from_config().await,
        webhook_config.secrets_cache_ttl(),
    ));
    let handler = Arc::new(WebhookHandler::new(
        secrets_ops,
        webhook_config.secrets_arn().map(str::to_string),
    ));

    let app = create_router(
        AuthConfig::new(gateway_config.api_key()),
        ThrottleState::new(plan),
        handler,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], gateway_config.port()));
    tracing::info!("リッスン開始: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("サーバーが正常に停止しました");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use webhook::domain::{AppSecrets, SAMPLE_ISSUE_EVENT};
    use webhook::infrastructure::SecretsOpsError;

    /// テスト用のAPIキー
    const TEST_KEY: &str = "test-api-key-for-main-tests";

    /// テスト用のモックSecrets Manager操作
    struct MockSecretsOps {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecretsOps for MockSecretsOps {
        async fn get_app_secrets(&self, _secret_id: &str) -> Result<AppSecrets, SecretsOpsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AppSecrets::new("sk-ant-test", "password"))
        }
    }

    fn plan(rate: u32, burst: u32, quota: u32) -> UsagePlan {
        UsagePlan {
            rate_limit: NonZeroU32::new(rate).unwrap(),
            burst_limit: NonZeroU32::new(burst).unwrap(),
            quota_limit: NonZeroU32::new(quota).unwrap(),
        }
    }

    /// テスト用のルーターを作成（シークレット取得回数を返す）
    fn create_test_router_with_plan(usage_plan: UsagePlan) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let secrets_ops: Box<dyn SecretsOps> = Box::new(MockSecretsOps {
            calls: calls.clone(),
        });
        let handler = Arc::new(WebhookHandler::new(
            secrets_ops,
            Some("test-secret".to_string()),
        ));

        let app = create_router(
            AuthConfig::new(TEST_KEY),
            ThrottleState::new(usage_plan),
            handler,
        );
        (app, calls)
    }

    fn create_test_router() -> (Router, Arc<AtomicUsize>) {
        create_test_router_with_plan(UsagePlan::default_plan())
    }

    fn events_request(method: &str, api_key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/events")
            .method(method)
            .header("X-Gitlab-Event", "Issue Hook")
            .header("Content-Type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// ヘルスチェックは認証なしで200 OKを返すことを確認
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let (app, _) = create_test_router();

        let request = Request::builder()
            .uri("/health")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    /// 有効なAPIキーでPOSTすると200とイベント種別を返すことを確認
    #[tokio::test]
    async fn test_post_event_with_valid_key_returns_ok() {
        let (app, calls) = create_test_router();

        let response = app
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["message"], webhook::domain::ACCEPTED_MESSAGE);
        assert_eq!(body["method"], "POST");
        assert_eq!(body["event"], "Issue Hook");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// APIキーなしでは403 Forbiddenを返し、ハンドラーに到達しないことを確認
    #[tokio::test]
    async fn test_post_event_without_key_returns_forbidden() {
        let (app, calls) = create_test_router();

        let response = app
            .oneshot(events_request("POST", None, SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["message"], "Forbidden");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// POST以外のメソッドはハンドラーに届かず403 Missing Authentication Tokenを返すことを確認
    #[tokio::test]
    async fn test_get_event_returns_missing_authentication_token() {
        let (app, calls) = create_test_router();

        for api_key in [Some(TEST_KEY), None] {
            let response = app
                .clone()
                .oneshot(events_request("GET", api_key, ""))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_eq!(
                body_json(response).await["message"],
                "Missing Authentication Token"
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// 未定義のメソッドはクォータを消費しないことを確認
    #[tokio::test]
    async fn test_undefined_method_does_not_consume_quota() {
        let (app, _) = create_test_router_with_plan(plan(1000, 1000, 1));

        for method in ["GET", "PUT", "DELETE"] {
            let response = app
                .clone()
                .oneshot(events_request(method, Some(TEST_KEY), ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        let response = app
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// JSONでないボディでも200を返すことを確認
    #[tokio::test]
    async fn test_post_invalid_body_still_returns_ok() {
        let (app, _) = create_test_router();

        let request = Request::builder()
            .uri("/events")
            .method("POST")
            .header("x-api-key", TEST_KEY)
            .body(Body::from("not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // ヘッダーがないので種別は判定できない
        assert!(body_json(response).await.get("event").is_none());
    }

    /// 未定義のパスはキーの有無に関係なく403 Missing Authentication Tokenを返すことを確認
    #[tokio::test]
    async fn test_unknown_path_returns_missing_authentication_token() {
        let (app, _) = create_test_router();

        for api_key in [Some(TEST_KEY), None] {
            let mut builder = Request::builder().uri("/unknown").method("POST");
            if let Some(key) = api_key {
                builder = builder.header("x-api-key", key);
            }
            let request = builder.body(Body::empty()).unwrap();

            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_eq!(
                body_json(response).await["message"],
                "Missing Authentication Token"
            );
        }
    }

    /// バースト超過で429を返すことを確認
    #[tokio::test]
    async fn test_burst_exceeded_returns_too_many_requests() {
        let (app, calls) = create_test_router_with_plan(plan(1, 1, 100));

        let first = app
            .clone()
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(second).await["message"], "Too Many Requests");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// 認証失敗したリクエストはクォータを消費しないことを確認
    #[tokio::test]
    async fn test_forbidden_requests_do_not_consume_quota() {
        let (app, _) = create_test_router_with_plan(plan(1000, 1000, 1));

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(events_request("POST", Some("wrong-key"), SAMPLE_ISSUE_EVENT))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        let accepted = app
            .clone()
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);

        let exceeded = app
            .oneshot(events_request("POST", Some(TEST_KEY), SAMPLE_ISSUE_EVENT))
            .await
            .unwrap();
        assert_eq!(exceeded.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(exceeded).await["message"], "Limit Exceeded");
    }

    #[test]
    fn test_to_webhook_request_copies_parts() {
        let mut headers = HeaderMap::new();
        headers.insert("x-gitlab-event", "Push Hook".parse().unwrap());
        let body = Bytes::from_static(b"{\"object_kind\":\"push\"}");

        let request = to_webhook_request(&Method::POST, &"/events?x=1".parse().unwrap(), &headers, &body);

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/events");
        assert_eq!(request.header("x-gitlab-event"), Some("Push Hook"));
        assert_eq!(request.body.as_deref(), Some("{\"object_kind\":\"push\"}"));
    }

    #[test]
    fn test_to_webhook_request_empty_body_is_none() {
        let request = to_webhook_request(&Method::POST, &"/events".parse().unwrap(), &HeaderMap::new(), &Bytes::new());
        assert!(request.body.is_none());
    }
}
