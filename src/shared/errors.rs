use axum::http::StatusCode;
use thiserror::Error;

use super::ocpi_status::OcpiStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Invalid {entity}.{attribute}: {reason}")]
    InvalidAttribute {
        entity: &'static str,
        attribute: &'static str,
        reason: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Presented token is not recognised for the addressed platform.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Entity or command does not belong to the addressed platform/party.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("no compatible version found (local: {local:?}, remote: {remote:?})")]
    NoCompatibleVersion {
        local: Vec<String>,
        remote: Vec<String>,
    },

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn invalid(entity: &'static str, attribute: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            entity,
            attribute,
            reason: reason.into(),
        }
    }

    /// OCPI status code reported to the counterpart.
    pub fn ocpi_status(&self) -> OcpiStatus {
        match self {
            Self::Validation(_) | Self::InvalidAttribute { .. } => OcpiStatus::INVALID_PARAMETERS,
            Self::NotFound { entity, .. } => match *entity {
                "Location" | "Evse" | "Connector" => OcpiStatus::UNKNOWN_LOCATION,
                "Token" => OcpiStatus::UNKNOWN_TOKEN,
                _ => OcpiStatus::CLIENT_ERROR,
            },
            Self::Conflict(_) | Self::Unauthorized(_) | Self::Forbidden(_) => {
                OcpiStatus::CLIENT_ERROR
            }
            Self::NoCompatibleVersion { .. } | Self::UnsupportedVersion(_) => {
                OcpiStatus::UNSUPPORTED_VERSION
            }
            Self::Transport(_) => OcpiStatus::UNABLE_TO_USE_CLIENT_API,
            Self::Storage(_) => OcpiStatus::SERVER_ERROR,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidAttribute { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NoCompatibleVersion { .. } | Self::UnsupportedVersion(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure talking to a remote platform.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Failed to send request to {url}: {reason}")]
    SendFailed { url: String, reason: String },

    #[error("Remote returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// Well-formed OCPI envelope carrying a non-success status code.
    #[error("Remote error {status_code}: {message}")]
    Remote { status_code: u16, message: String },

    #[error("Remote platform {0} has no registered client")]
    NoClient(String),

    #[error("Remote platform {platform_id} exposes no {module} endpoint")]
    NoEndpoint { platform_id: String, module: String },
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<InfraError> for DomainError {
    fn from(err: InfraError) -> Self {
        DomainError::Storage(err.to_string())
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
