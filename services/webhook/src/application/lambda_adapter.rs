// lambda_httpとドメインモデルの変換
//
// API Gatewayプロキシ統合のリクエストをWebhookRequestに変換し、
// WebhookResponseをlambda_httpのレスポンスに戻す。

use lambda_http::http;
use lambda_http::{Body, Request, Response};

use crate::domain::{WebhookRequest, WebhookResponse};

/// lambda_httpのリクエストをWebhookRequestに変換する
///
/// UTF-8として読めないヘッダー値はスキップする。
/// バイナリボディ（isBase64Encoded）はデコード済みのバイト列を非可逆にUTF-8化する。
pub fn to_webhook_request(request: &Request) -> WebhookRequest {
    let mut webhook_request =
        WebhookRequest::new(request.method().as_str(), request.uri().path());

    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            webhook_request.insert_header(name.as_str(), value);
        }
    }

    webhook_request.body = match request.body() {
        Body::Text(text) => Some(text.clone()),
        Body::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Body::Empty => None,
        _ => None,
    }
    .filter(|body| !body.is_empty());

    webhook_request
}

/// WebhookResponseをlambda_httpのレスポンスに変換する
///
/// 不正なヘッダー名・値はレスポンス構築時のエラーになる。
pub fn into_lambda_response(response: WebhookResponse) -> Result<Response<Body>, http::Error> {
    let mut builder = Response::builder().status(response.status);

    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Body::Text(response.body_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lambda_http::http::Request as HttpRequest;

    fn body_text(response: &Response<Body>) -> String {
        match response.body() {
            Body::Text(text) => text.clone(),
            Body::Binary(bytes) => String::from_utf8(bytes.clone()).unwrap(),
            Body::Empty => String::new(),
            _ => String::new(),
        }
    }

    #[test]
    fn test_to_webhook_request_text_body() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/events")
            .header("X-Gitlab-Event", "Issue Hook")
            .header("x-api-key", "secret")
            .body(Body::Text("{\"object_kind\":\"issue\"}".to_string()))
            .unwrap();

        let webhook_request = to_webhook_request(&request);

        assert_eq!(webhook_request.method, "POST");
        assert_eq!(webhook_request.path, "/events");
        assert_eq!(webhook_request.header("x-gitlab-event"), Some("Issue Hook"));
        assert_eq!(webhook_request.body.as_deref(), Some("{\"object_kind\":\"issue\"}"));
    }

    #[test]
    fn test_to_webhook_request_binary_and_empty_body() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/events")
            .body(Body::Binary(b"{}".to_vec()))
            .unwrap();
        assert_eq!(to_webhook_request(&request).body.as_deref(), Some("{}"));

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/events")
            .body(Body::Empty)
            .unwrap();
        assert_eq!(to_webhook_request(&request).body, None);

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/events")
            .body(Body::Text(String::new()))
            .unwrap();
        assert_eq!(to_webhook_request(&request).body, None);
    }

    #[test]
    fn test_into_lambda_response_405() {
        let response =
            into_lambda_response(WebhookResponse::method_not_allowed("GET", Utc::now())).unwrap();

        assert_eq!(response.status(), 405);
        assert_eq!(response.headers().get("allow").unwrap(), "POST");
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");

        let parsed: serde_json::Value = serde_json::from_str(&body_text(&response)).unwrap();
        assert_eq!(parsed["error"], "Method Not Allowed");
    }

    #[test]
    fn test_into_lambda_response_200() {
        let response =
            into_lambda_response(WebhookResponse::accepted("POST", None, Utc::now())).unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers().get("allow").is_none());

        let parsed: serde_json::Value = serde_json::from_str(&body_text(&response)).unwrap();
        assert_eq!(parsed["message"], "Event received successfully");
    }
}
