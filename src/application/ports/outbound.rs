//! Outbound port: calls made to remote platforms
//!
//! [`OcpiTransport`] decouples the handshake, synchronizers and command
//! manager from the concrete HTTP client. The production implementation is
//! [`ReqwestTransport`](crate::infrastructure::http::ReqwestTransport); tests
//! plug in a recording fake.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::shared::errors::TransportError;
use crate::shared::ocpi_status::OcpiStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to a remote platform
#[derive(Debug, Clone)]
pub struct OcpiRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Raw token; the transport encodes it per `version`.
    pub token: String,
    /// Protocol version the token header is formatted for (`None` before negotiation)
    pub version: Option<String>,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub correlation_id: String,
}

impl OcpiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            token: token.into(),
            version: None,
            body: None,
            query: Vec::new(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(str::to_string);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Decoded OCPI envelope plus pagination headers
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub http_status: u16,
    pub status_code: OcpiStatus,
    pub status_message: Option<String>,
    pub data: Value,
    /// `X-Total-Count`
    pub total_count: Option<u64>,
    /// `X-Limit`
    pub limit: Option<u64>,
    /// `Link: <...>; rel="next"`
    pub next_link: Option<String>,
}

impl RemoteResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            http_status: 200,
            status_code: OcpiStatus::SUCCESS,
            status_message: None,
            data,
            total_count: None,
            limit: None,
            next_link: None,
        }
    }

    /// Non-success embedded status as a typed error
    pub fn into_result(self) -> Result<Self, TransportError> {
        if self.status_code.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Remote {
                status_code: self.status_code.code(),
                message: self.status_message.unwrap_or_default(),
            })
        }
    }
}

/// Port for calling remote platforms.
///
/// Implementations map non-2xx statuses, empty or malformed bodies to
/// [`TransportError`]; a well-formed envelope is returned even when its
/// `status_code` is not 1000 so callers can inspect it. No retries.
#[async_trait]
pub trait OcpiTransport: Send + Sync {
    async fn send(&self, request: OcpiRequest) -> Result<RemoteResponse, TransportError>;
}

pub type SharedTransport = Arc<dyn OcpiTransport>;
