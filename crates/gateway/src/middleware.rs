//! # リクエストヘッダサイズ制限
//!
//! リクエストライン + 全ヘッダの合計が上限を超えるリクエストを 431 で拒否する。

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;

/// リクエストライン + ヘッダのおおよそのワイヤサイズ（バイト）。
pub fn header_bytes(request: &Request) -> usize {
    // "METHOD URI HTTP/1.1\r\n"
    let request_line = request.method().as_str().len() + request.uri().to_string().len() + 12;
    request
        .headers()
        .iter()
        // "name: value\r\n"
        .map(|(name, value)| name.as_str().len() + value.len() + 4)
        .sum::<usize>()
        + request_line
}

pub async fn limit_header_size(
    State(max_header_bytes): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let size = header_bytes(&request);
    if size > max_header_bytes {
        tracing::warn!(size, max_header_bytes, "リクエストヘッダが上限を超えています");
        return GatewayError::HeadersTooLarge.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app(max: usize) -> axum::Router {
        axum::Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(max, limit_header_size))
    }

    #[tokio::test]
    async fn test_headers_within_limit() {
        let request = axum::http::Request::builder()
            .uri("/")
            .header("x-small", "1")
            .body(Body::empty())
            .unwrap();
        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_headers_rejected() {
        let request = axum::http::Request::builder()
            .uri("/")
            .header("x-large", "a".repeat(2048))
            .body(Body::empty())
            .unwrap();
        let response = app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("error").is_some());
    }
}
