//! Router middleware shared by the services.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// RPC method the HTTP-over-RPC transport dispatches every request through.
pub const HTTPGRPC_HANDLE_METHOD: &str = "/httpgrpc.HTTP/Handle";

/// Propagates the caller's `x-request-id` when it is present and printable,
/// otherwise mints one, and echoes it on the response.
pub async fn set_request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|existing| existing.to_str().ok())
        .filter(|existing| !existing.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), header_value);
    }

    let mut response = next.run(request).await;

    if !response.headers().contains_key(&REQUEST_ID_HEADER) {
        if let Ok(header_value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER.clone(), header_value);
        }
    }

    response
}

/// Runs the request inside a span named after the handle method and URL,
/// tagged with the HTTP url and method.
pub async fn instrument_httpgrpc_handle(request: Request<Body>, next: Next) -> Response {
    let url = request.uri().to_string();
    let method = request.method().to_string();
    let span = info_span!(
        "httpgrpc_handle",
        otel.name = %format!("{HTTPGRPC_HANDLE_METHOD}{url}"),
        http.url = %url,
        http.method = %method,
    );

    next.run(request).instrument(span).await
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(instrument_httpgrpc_handle))
            .layer(middleware::from_fn(set_request_id))
    }

    #[tokio::test]
    async fn assigns_request_id() {
        let response = router()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(&REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn keeps_caller_request_id() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(&REQUEST_ID_HEADER).unwrap(),
            "abc-123"
        );
    }

    #[tokio::test]
    async fn replaces_empty_request_id() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("x-request-id", "")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(&REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}
