//! APIエラーハンドリング
//!
//! API Gatewayと同じエラーレスポンス形式を提供する。
//! すべてのエラーはJSON形式で返却され、`message`フィールドのみを含む。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// APIエラーレスポンスのボディ
///
/// API Gatewayのゲートウェイレスポンスと同じく`{"message": ...}`の形をとる。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    /// エラーメッセージ
    pub message: String,
}

/// APIエラー
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTPステータスコード
    status: StatusCode,
    /// エラーレスポンスボディ
    body: ApiErrorBody,
}

impl ApiError {
    /// 新しいApiErrorを作成
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                message: message.into(),
            },
        }
    }

    /// 403 Forbidden: APIキーなし・不一致
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden")
    }

    /// 403 Missing Authentication Token: 存在しないリソース
    pub fn missing_authentication_token() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Missing Authentication Token")
    }

    /// 429 Too Many Requests: rate/burst超過
    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
    }

    /// 429 Limit Exceeded: 日次クォータ超過
    pub fn limit_exceeded() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Limit Exceeded")
    }

    /// 500 Internal Server Errorを作成
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// エラーメッセージを取得
    pub fn message(&self) -> &str {
        &self.body.message
    }

    /// ステータスコードを取得
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    /// 各コンストラクタが正しいステータスとメッセージを返すことを確認
    #[test]
    fn test_constructors() {
        let cases = [
            (ApiError::forbidden(), StatusCode::FORBIDDEN, "Forbidden"),
            (
                ApiError::missing_authentication_token(),
                StatusCode::FORBIDDEN,
                "Missing Authentication Token",
            ),
            (
                ApiError::too_many_requests(),
                StatusCode::TOO_MANY_REQUESTS,
                "Too Many Requests",
            ),
            (
                ApiError::limit_exceeded(),
                StatusCode::TOO_MANY_REQUESTS,
                "Limit Exceeded",
            ),
            (
                ApiError::internal_error("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "boom",
            ),
        ];

        for (error, status, message) in cases {
            assert_eq!(error.status(), status);
            assert_eq!(error.message(), message);
        }
    }

    /// ApiErrorBodyが`message`だけを持つJSONにシリアライズされることを確認
    #[test]
    fn test_api_error_body_serializes_to_json() {
        let body = ApiErrorBody {
            message: "Forbidden".to_string(),
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"message":"Forbidden"}"#);
    }

    /// forbiddenがJSON形式で403レスポンスを返すことを確認
    #[tokio::test]
    async fn test_forbidden_returns_json_403() {
        async fn error_handler() -> ApiError {
            ApiError::forbidden()
        }

        let app = Router::new().route("/error", get(error_handler));
        let request = Request::builder()
            .uri("/error")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error_body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(error_body, serde_json::json!({ "message": "Forbidden" }));
    }
}
