//! Request correlation ids.
//!
//! An id forwarded by the proxy in `x-request-id` is reused when it looks
//! sane; anything else gets a fresh UUID v4. The id ends up on the request
//! span, as a Sentry tag, in the request extensions as [`RequestId`], and
//! on the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id we pass through.
const MAX_UPSTREAM_LEN: usize = 128;

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuse a forwarded id only if it is short, printable ASCII.
fn upstream_id(value: &HeaderValue) -> Option<String> {
    let id = value.to_str().ok()?.trim();
    let sane = !id.is_empty()
        && id.len() <= MAX_UPSTREAM_LEN
        && id.bytes().all(|b| b.is_ascii_graphic());
    sane.then(|| id.to_owned())
}

/// Attach a [`RequestId`] to every request and echo it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(upstream_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let header = HeaderValue::from_str(&request_id).ok();
    request.extensions_mut().insert(RequestId(request_id));

    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        let value = HeaderValue::from_static("cf-7f3a9c21");
        assert_eq!(upstream_id(&value).as_deref(), Some("cf-7f3a9c21"));
    }

    #[test]
    fn test_upstream_id_rejected() {
        assert!(upstream_id(&HeaderValue::from_static("")).is_none());
        assert!(upstream_id(&HeaderValue::from_static("has space")).is_none());

        let long = "a".repeat(MAX_UPSTREAM_LEN + 1);
        assert!(upstream_id(&HeaderValue::from_str(&long).unwrap()).is_none());
    }
}
