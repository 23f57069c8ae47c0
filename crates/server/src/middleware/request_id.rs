//! Request correlation IDs.
//!
//! An upstream `x-request-id` is reused when it looks sane (visible ASCII, at
//! most [`MAX_REQUEST_ID_LEN`] bytes); anything else is replaced by a fresh
//! UUID v4. The ID is recorded on the `http_request` span, tagged on the
//! Sentry scope, stored as a [`RequestId`] extension and echoed back.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted as-is.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn accept_upstream(value: &HeaderValue) -> Option<String> {
    let id = value.to_str().ok()?.trim();
    let sane = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic());
    sane.then(|| id.to_string())
}

/// Middleware that ensures every request carries a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(accept_upstream)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
