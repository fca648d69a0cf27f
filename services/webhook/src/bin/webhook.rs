/// GitLab Webhook HTTP Lambdaエントリポイント
///
/// API Gateway（Lambdaプロキシ統合）経由のHTTPリクエストを処理する。
/// POST以外は405、POSTはシークレットを読み込みイベントを判定したうえで200を返す。
use lambda_http::{Body, Error, Request, Response, run, service_fn};
use tracing::{error, info};
use webhook::application::{WebhookHandler, into_lambda_response, to_webhook_request};
use webhook::infrastructure::{
    AwsSecretsOps, CachedSecretsOps, SecretsOps, WebhookConfig, init_logging,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    // 設定を環境変数から読み込み
    let config = WebhookConfig::from_env().map_err(|err| {
        error!(error = %err, "Webhook設定読み込み失敗");
        err
    })?;

    info!(
        secrets_arn = config.secrets_arn().unwrap_or("-"),
        secrets_cache_ttl_seconds = config.secrets_cache_ttl().as_secs(),
        "Webhook Lambda関数を初期化"
    );

    // ハンドラーはコールドスタート時に1度だけ作成し、全呼び出しで共有する
    let secrets_ops = CachedSecretsOps::new(AwsSecretsOps::from_config().await, config.secrets_cache_ttl());
    let handler = WebhookHandler::new(secrets_ops, config.secrets_arn().map(str::to_string));
    let handler = &handler;

    // Lambda関数を実行
    run(service_fn(move |request: Request| async move {
        handle_request(handler, request).await
    }))
    .await
}

/// HTTPリクエストハンドラー
///
/// # Arguments
/// * `handler` - Webhookハンドラー
/// * `request` - API Gatewayから渡されたHTTPリクエスト
///
/// # Returns
/// WebhookResponseをそのまま変換したHTTPレスポンス
async fn handle_request<S: SecretsOps>(
    handler: &WebhookHandler<S>,
    request: Request,
) -> Result<Response<Body>, Error> {
    let webhook_request = to_webhook_request(&request);
    let response = handler.handle(&webhook_request).await;

    info!(status = response.status, "Webhookレスポンス送信");

    Ok(into_lambda_response(response)?)
}
