//! OCPI status codes
//!
//! Every response envelope carries one of these codes so a counterpart can
//! branch on the category without parsing `status_message`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OcpiStatus(pub u16);

/// Coarse classification of an [`OcpiStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Success,
    ClientError,
    ServerError,
    HubError,
    Unknown,
}

impl OcpiStatus {
    pub const SUCCESS: Self = Self(1000);
    pub const CLIENT_ERROR: Self = Self(2000);
    pub const INVALID_PARAMETERS: Self = Self(2001);
    pub const NOT_ENOUGH_INFORMATION: Self = Self(2002);
    pub const UNKNOWN_LOCATION: Self = Self(2003);
    pub const UNKNOWN_TOKEN: Self = Self(2004);
    pub const SERVER_ERROR: Self = Self(3000);
    pub const UNABLE_TO_USE_CLIENT_API: Self = Self(3001);
    pub const UNSUPPORTED_VERSION: Self = Self(3002);
    pub const NO_MATCHING_ENDPOINTS: Self = Self(3003);
    pub const HUB_ERROR: Self = Self(4000);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn category(&self) -> StatusCategory {
        match self.0 {
            1000..=1999 => StatusCategory::Success,
            2000..=2999 => StatusCategory::ClientError,
            3000..=3999 => StatusCategory::ServerError,
            4000..=4999 => StatusCategory::HubError,
            _ => StatusCategory::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        self.category() == StatusCategory::Success
    }

    pub fn is_server_error(&self) -> bool {
        self.category() == StatusCategory::ServerError
    }
}

impl fmt::Display for OcpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
