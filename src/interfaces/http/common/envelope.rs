//! OCPI response envelope
//!
//! Every response, success or failure, is
//! `{data, status_code, status_message, timestamp}`. Failures carry the
//! OCPI status of the [`DomainError`] and its HTTP status.

use axum::http::header::{HeaderName, HeaderValue, LINK};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::shared::errors::DomainError;
use crate::shared::ocpi_status::OcpiStatus;

#[derive(Debug, Serialize)]
pub struct OcpiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> OcpiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            status_code: OcpiStatus::SUCCESS.code(),
            status_message: Some("Success".to_string()),
            timestamp: Utc::now(),
        }
    }
}

impl OcpiResponse<()> {
    pub fn empty() -> Self {
        Self {
            data: None,
            status_code: OcpiStatus::SUCCESS.code(),
            status_message: Some("Success".to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn error(status: OcpiStatus, message: impl Into<String>) -> Self {
        Self {
            data: None,
            status_code: status.code(),
            status_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for OcpiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// One page of a sender listing with its pagination headers
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    /// Absolute URL of the next page
    pub next: Option<String>,
}

impl<T: Serialize> IntoResponse for Paged<T> {
    fn into_response(self) -> Response {
        let mut response = OcpiResponse::success(self.items).into_response();
        let headers = response.headers_mut();
        headers.insert(HeaderName::from_static("x-total-count"), HeaderValue::from(self.total));
        headers.insert(HeaderName::from_static("x-limit"), HeaderValue::from(self.limit));
        if let Some(next) = self.next {
            if let Ok(value) = HeaderValue::from_str(&format!("<{}>; rel=\"next\"", next)) {
                headers.insert(LINK, value);
            }
        }
        response
    }
}

/// [`DomainError`] rendered as an OCPI error envelope
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        let ocpi = self.0.ocpi_status();
        if status.is_server_error() {
            error!(error = %self.0, status_code = ocpi.code(), "Request failed");
        } else {
            warn!(error = %self.0, status_code = ocpi.code(), "Request rejected");
        }
        (status, Json(OcpiResponse::error(ocpi, self.0.to_string()))).into_response()
    }
}
