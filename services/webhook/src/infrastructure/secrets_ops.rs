//! Secrets Manager操作モジュール
//!
//! Webhook Lambdaで使用するアプリケーションシークレットの取得を提供する。
//! - GetSecretValueでSecretString/SecretBinaryを取得
//! - ウォームコンテナ向けにTTL付きでキャッシュ

use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{AppSecrets, AppSecretsError};

/// Secrets Manager操作のエラー型
#[derive(Debug, Error)]
pub enum SecretsOpsError {
    /// AWS SDK エラー
    #[error("AWS Secrets Manager APIエラー: {0}")]
    AwsSdkError(String),
    /// SecretString/SecretBinaryのどちらも含まれていない
    #[error("シークレットに値がありません: {0}")]
    EmptySecret(String),
    /// シークレットの内容が不正
    #[error("シークレットの解析に失敗しました: {0}")]
    Parse(#[from] AppSecretsError),
}

/// Secrets Manager操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait SecretsOps: Send + Sync {
    /// アプリケーションシークレットを取得する
    ///
    /// # 引数
    /// * `secret_id` - シークレットのARNまたは名前
    async fn get_app_secrets(&self, secret_id: &str) -> Result<AppSecrets, SecretsOpsError>;
}

#[async_trait]
impl<T: SecretsOps + ?Sized> SecretsOps for Box<T> {
    async fn get_app_secrets(&self, secret_id: &str) -> Result<AppSecrets, SecretsOpsError> {
        (**self).get_app_secrets(secret_id).await
    }
}

/// 実際のAWS Secrets Manager SDKを使用した実装
pub struct AwsSecretsOps {
    client: SecretsManagerClient,
}

impl AwsSecretsOps {
    /// 新しいAwsSecretsOpsを作成
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SecretsManagerClient::new(&config);
        Self::new(client)
    }
}

#[async_trait]
impl SecretsOps for AwsSecretsOps {
    async fn get_app_secrets(&self, secret_id: &str) -> Result<AppSecrets, SecretsOpsError> {
        debug!(secret_id = %secret_id, "GetSecretValue呼び出し");

        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| {
                warn!(secret_id = %secret_id, error = %err, "GetSecretValueエラー");
                SecretsOpsError::AwsSdkError(err.to_string())
            })?;

        // SecretStringを優先し、なければSecretBinaryを使う
        if let Some(secret_string) = response.secret_string() {
            return Ok(AppSecrets::from_secret_string(secret_string)?);
        }

        if let Some(secret_binary) = response.secret_binary() {
            return Ok(AppSecrets::from_secret_binary(secret_binary.as_ref())?);
        }

        Err(SecretsOpsError::EmptySecret(secret_id.to_string()))
    }
}

/// キャッシュエントリ
struct CachedEntry {
    secret_id: String,
    secrets: AppSecrets,
    fetched_at: Instant,
}

/// TTL付きキャッシュでSecretsOpsをラップする
///
/// シークレットIDごとに最後に取得した値を1件だけ保持する。
/// エラーはキャッシュしない。TTLが0の場合はキャッシュを無効にする。
pub struct CachedSecretsOps<S> {
    inner: S,
    ttl: Duration,
    entry: Mutex<Option<CachedEntry>>,
}

impl<S: SecretsOps> CachedSecretsOps<S> {
    /// 新しいキャッシュを作成
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// ラップしている実装への参照
    #[cfg(test)]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SecretsOps> SecretsOps for CachedSecretsOps<S> {
    async fn get_app_secrets(&self, secret_id: &str) -> Result<AppSecrets, SecretsOpsError> {
        if self.ttl.is_zero() {
            return self.inner.get_app_secrets(secret_id).await;
        }

        // 取得中もロックを保持し、同時呼び出しでの重複取得を防ぐ
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.secret_id == secret_id && cached.fetched_at.elapsed() < self.ttl {
                debug!(secret_id = %secret_id, "シークレットキャッシュヒット");
                return Ok(cached.secrets.clone());
            }
        }

        let secrets = self.inner.get_app_secrets(secret_id).await?;

        info!(secret_id = %secret_id, ttl_seconds = self.ttl.as_secs(), "シークレットをキャッシュ");
        *entry = Some(CachedEntry {
            secret_id: secret_id.to_string(),
            secrets: secrets.clone(),
            fetched_at: Instant::now(),
        });

        Ok(secrets)
    }
}
