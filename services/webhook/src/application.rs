// アプリケーション層モジュール
pub mod lambda_adapter;
pub mod webhook_handler;

// 再エクスポート
pub use lambda_adapter::{into_lambda_response, to_webhook_request};
pub use webhook_handler::{SecretsStatus, WebhookHandler};
