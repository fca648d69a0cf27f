//! GitLab Webhook受信Lambda
//!
//! API Gateway（POST /events）経由で届くGitLabのWebhookを受け付け、
//! Secrets Managerのアプリケーションシークレットを読み込んだうえで
//! イベントを判定・ログ出力する。

// Domain layer modules
pub mod domain;

// Application layer modules
pub mod application;

// Infrastructure layer modules
pub mod infrastructure;
