//! reqwest implementation of [`OcpiTransport`]
//!
//! Formats the `Authorization` header for the negotiated version, tags each
//! call with request and correlation ids, and decodes the OCPI envelope and
//! pagination headers. Retries are left to the periodic pull.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, LINK};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::ports::{HttpMethod, OcpiRequest, OcpiTransport, RemoteResponse};
use crate::shared::errors::TransportError;
use crate::shared::ocpi_status::OcpiStatus;
use crate::shared::token::authorization_header;

const X_REQUEST_ID: &str = "X-Request-ID";
const X_CORRELATION_ID: &str = "X-Correlation-ID";
const X_TOTAL_COUNT: &str = "X-Total-Count";
const X_LIMIT: &str = "X-Limit";

#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| TransportError::SendFailed {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl OcpiTransport for ReqwestTransport {
    async fn send(&self, request: OcpiRequest) -> Result<RemoteResponse, TransportError> {
        let url = request.url.clone();
        debug!(
            method = %request.method,
            url = %url,
            correlation_id = %request.correlation_id,
            "Calling remote platform"
        );

        let mut builder = self
            .client
            .request(method(request.method), &url)
            .header(
                AUTHORIZATION,
                authorization_header(&request.token, request.version.as_deref()),
            )
            .header(X_REQUEST_ID, uuid::Uuid::new_v4().to_string())
            .header(X_CORRELATION_ID, &request.correlation_id);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = builder.send().await.map_err(|e| TransportError::SendFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Remote returned error status");
            return Err(TransportError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| TransportError::SendFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        decode(&url, status.as_u16(), &headers, &text)
    }
}

#[derive(Deserialize)]
struct Envelope {
    status_code: u16,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    data: Value,
}

fn decode(
    url: &str,
    http_status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Result<RemoteResponse, TransportError> {
    if body.trim().is_empty() {
        return Err(TransportError::EmptyResponse(url.to_string()));
    }
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| TransportError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(RemoteResponse {
        http_status,
        status_code: OcpiStatus(envelope.status_code),
        status_message: envelope.status_message,
        data: envelope.data,
        total_count: numeric_header(headers, X_TOTAL_COUNT),
        limit: numeric_header(headers, X_LIMIT),
        next_link: headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(next_link),
    })
}

fn numeric_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Target of the `rel="next"` entry of a `Link` header value
fn next_link(value: &str) -> Option<String> {
    value.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim().to_ascii_lowercase();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn next_link_picks_the_next_relation() {
        let header = r#"<https://p1.example/ocpi/2.2.1/tariffs?offset=0>; rel="prev", <https://p1.example/ocpi/2.2.1/tariffs?offset=50&limit=50>; rel="next""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://p1.example/ocpi/2.2.1/tariffs?offset=50&limit=50")
        );
        assert_eq!(next_link(r#"<https://p1.example/x>; rel="prev""#), None);
    }

    #[test]
    fn envelope_and_pagination_headers_are_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TOTAL_COUNT, HeaderValue::from_static("120"));
        headers.insert(X_LIMIT, HeaderValue::from_static("50"));
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://p1.example/page2>; rel=\"next\""),
        );
        let body = r#"{"status_code":1000,"status_message":"OK","data":[{"id":"T1"}],"timestamp":"2024-05-01T12:00:00Z"}"#;

        let response = decode("https://p1.example", 200, &headers, body).unwrap();
        assert_eq!(response.status_code, OcpiStatus::SUCCESS);
        assert_eq!(response.total_count, Some(120));
        assert_eq!(response.limit, Some(50));
        assert_eq!(response.next_link.as_deref(), Some("https://p1.example/page2"));
        assert_eq!(response.data[0]["id"], "T1");
    }

    #[test]
    fn empty_and_malformed_bodies_are_errors() {
        let headers = HeaderMap::new();
        assert!(matches!(
            decode("u", 200, &headers, "  "),
            Err(TransportError::EmptyResponse(_))
        ));
        assert!(matches!(
            decode("u", 200, &headers, "<html>"),
            Err(TransportError::Malformed { .. })
        ));
        assert!(matches!(
            decode("u", 200, &headers, r#"{"data":[]}"#),
            Err(TransportError::Malformed { .. })
        ));
    }

    #[test]
    fn error_envelope_is_returned_for_inspection() {
        let body = r#"{"status_code":2001,"status_message":"Invalid tariff"}"#;
        let response = decode("u", 200, &HeaderMap::new(), body).unwrap();
        assert_eq!(response.status_code, OcpiStatus::INVALID_PARAMETERS);
        assert!(response.into_result().is_err());
    }
}
