//! APIキー認証ミドルウェア
//!
//! API GatewayのAPIキー必須設定を再現する。
//! - x-api-keyヘッダーを環境変数に設定されたキーと照合
//! - /healthエンドポイントは認証をバイパス
//! - キーなし・不一致時は403 Forbidden（JSON形式）を返却

use crate::error::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use webhook::infrastructure::event_sender::API_KEY_HEADER;

/// 認証設定
///
/// APIキーを保持する構造体。
/// axumのStateとして共有される。
#[derive(Clone)]
pub struct AuthConfig {
    /// APIキー（環境変数から取得）
    pub api_key: String,
}

impl AuthConfig {
    /// 新しいAuthConfigを作成
    ///
    /// # Arguments
    /// * `api_key` - APIキー
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

/// APIキー認証ミドルウェア
///
/// API Gatewayと同様、キーは前後の空白も含めて完全一致で比較する。
///
/// # Returns
/// - 認証成功時: 次のハンドラーにリクエストを渡す
/// - 認証失敗時: 403 Forbidden（JSON形式）を返す
pub async fn api_key_middleware(
    State(config): State<AuthConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // /healthエンドポイントは認証をバイパス
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match api_key {
        Some(key) if key == config.api_key => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "無効なAPIキー");
            ApiError::forbidden().into_response()
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "x-api-keyヘッダーがありません");
            ApiError::forbidden().into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::{get, post},
    };
    use tower::ServiceExt;

    /// テスト用のAPIキー
    const TEST_KEY: &str = "test-api-key-12345";

    /// テスト用のルーターを作成
    fn create_test_router() -> Router {
        let config = AuthConfig::new(TEST_KEY);

        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route("/events", post(|| async { "events" }))
            .layer(middleware::from_fn_with_state(config, api_key_middleware))
    }

    fn events_request(api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/events").method("POST");
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// /healthエンドポイントは認証なしでアクセスできることを確認
    #[tokio::test]
    async fn test_health_endpoint_bypasses_auth() {
        let app = create_test_router();

        let request = Request::builder()
            .uri("/health")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "/healthは認証なしで200 OKを返すべき");
    }

    /// 有効なAPIキーでアクセスできることを確認
    #[tokio::test]
    async fn test_valid_api_key_allows_access() {
        let app = create_test_router();

        let response = app.oneshot(events_request(Some(TEST_KEY))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "有効なAPIキーで200 OKを返すべき");
    }

    /// 無効なAPIキーで403を返すことを確認
    #[tokio::test]
    async fn test_invalid_api_key_returns_forbidden() {
        let app = create_test_router();

        let response = app.oneshot(events_request(Some("wrong-key"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "無効なAPIキーで403を返すべき");
    }

    /// x-api-keyヘッダーなしで403とJSONボディを返すことを確認
    #[tokio::test]
    async fn test_missing_api_key_returns_forbidden() {
        let app = create_test_router();

        let response = app.oneshot(events_request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"message":"Forbidden"}"#);
    }

    /// 前後に空白があるキーは一致しないことを確認
    #[tokio::test]
    async fn test_api_key_with_whitespace_is_rejected() {
        let app = create_test_router();

        let response = app
            .oneshot(events_request(Some(&format!("{} ", TEST_KEY))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    /// Authorizationヘッダーはx-api-keyの代わりにならないことを確認
    #[tokio::test]
    async fn test_authorization_header_is_not_accepted() {
        let app = create_test_router();

        let request = Request::builder()
            .uri("/events")
            .method("POST")
            .header("Authorization", format!("Bearer {}", TEST_KEY))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    /// GitLab・スモーククライアントと同じヘッダー名で照合することを確認
    #[tokio::test]
    async fn test_api_key_header_name_is_shared() {
        assert_eq!(API_KEY_HEADER, "x-api-key");

        let app = create_test_router();
        let request = Request::builder()
            .uri("/events")
            .method("POST")
            .header("X-Api-Key", TEST_KEY)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_auth_config_creation() {
        let config = AuthConfig::new(String::from("my-key"));
        assert_eq!(config.api_key, "my-key");
    }
}
