//! Request ID middleware
//!
//! Reuses the caller's `X-Request-ID` (or generates one) and its
//! `X-Correlation-ID`, runs the request inside a span carrying both, and
//! echoes them back.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{field, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Request id, available to handlers via `Extension<RequestId>`
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

fn header_or_new(request: &Request<Body>, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = header_or_new(&request, REQUEST_ID_HEADER);
    let correlation_id = header_or_new(&request, CORRELATION_ID_HEADER);

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        correlation_id = %correlation_id,
        method = %request.method(),
        uri = %request.uri(),
        platform_id = field::Empty,
    );

    let mut response = next.run(request).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = request_id.parse() {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = correlation_id.parse() {
        headers.insert(CORRELATION_ID_HEADER, value);
    }
    response
}
