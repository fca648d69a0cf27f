//! Webhookハンドラー
//!
//! GitLabから届いたWebhookリクエストを処理する。
//! 1. POST以外は405を返す
//! 2. Secrets Managerからアプリケーションシークレットを取得（失敗はログのみ）
//! 3. GitLabイベントを判定してログ出力（失敗はログのみ）
//! 4. 200を返す
//!
//! シークレット取得やイベント判定に失敗してもステータスは200のまま。

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::{GITLAB_EVENT_HEADER, GitlabEvent, WebhookRequest, WebhookResponse};
use crate::infrastructure::SecretsOps;

/// シークレット取得の結果（ログ・テスト用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsStatus {
    /// 取得成功
    Loaded,
    /// SECRETS_ARN未設定のため取得しなかった
    NotConfigured,
    /// 取得に失敗した
    Failed,
}

/// Webhookハンドラー
pub struct WebhookHandler<S> {
    /// シークレット取得実装
    secrets_ops: S,
    /// シークレットのARN（未設定ならNone）
    secrets_arn: Option<String>,
}

impl<S: SecretsOps> WebhookHandler<S> {
    /// 新しいハンドラーを作成
    ///
    /// # Arguments
    /// * `secrets_ops` - シークレット取得実装
    /// * `secrets_arn` - シークレットのARN
    pub fn new(secrets_ops: S, secrets_arn: Option<String>) -> Self {
        Self {
            secrets_ops,
            secrets_arn,
        }
    }

    /// シークレット取得実装への参照
    #[cfg(test)]
    pub fn secrets_ops(&self) -> &S {
        &self.secrets_ops
    }

    /// 現在時刻でリクエストを処理する
    pub async fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        self.handle_at(request, Utc::now()).await
    }

    /// 指定時刻でリクエストを処理する
    pub async fn handle_at(&self, request: &WebhookRequest, now: DateTime<Utc>) -> WebhookResponse {
        info!("Lambda function started");
        info!(
            method = %request.method,
            path = %request.path,
            gitlab_event = request.header(GITLAB_EVENT_HEADER).unwrap_or("-"),
            body_length = request.body_len(),
            "Webhookリクエスト受信"
        );
        debug!(body = request.body.as_deref().unwrap_or(""), "リクエストボディ");

        if !request.is_post() {
            warn!(
                method = %request.method,
                "Method {} not allowed. Only POST is supported.",
                request.method
            );
            return WebhookResponse::method_not_allowed(&request.method, now);
        }

        info!("Processing POST request");

        self.load_secrets().await;

        let event_kind = match GitlabEvent::from_request(request) {
            Ok(event) => {
                info!(
                    event = event.kind.header_name(),
                    object_kind = event.object_kind.as_deref().unwrap_or("-"),
                    project = event.project.as_deref().unwrap_or("-"),
                    user = event.user.as_deref().unwrap_or("-"),
                    action = event.action.as_deref().unwrap_or("-"),
                    iid = ?event.object_iid,
                    event_uuid = event.event_uuid.as_deref().unwrap_or("-"),
                    "GitLabイベントを受信"
                );
                Some(event.kind)
            }
            Err(err) => {
                warn!(error = %err, "GitLabイベントとして解釈できません");
                None
            }
        };

        WebhookResponse::accepted(&request.method, event_kind.as_ref(), now)
    }

    /// シークレットを取得してログ出力する
    ///
    /// 値そのものはログに出さず、キー名のみ出力する。
    pub async fn load_secrets(&self) -> SecretsStatus {
        let Some(secret_id) = self.secrets_arn.as_deref() else {
            warn!("SECRETS_ARNが設定されていないため、シークレット取得をスキップ");
            return SecretsStatus::NotConfigured;
        };

        match self.secrets_ops.get_app_secrets(secret_id).await {
            Ok(secrets) => {
                info!(keys = ?secrets.keys(), "シークレットを取得");
                SecretsStatus::Loaded
            }
            Err(err) => {
                error!(error = %err, "Error retrieving secret");
                SecretsStatus::Failed
            }
        }
    }
}
