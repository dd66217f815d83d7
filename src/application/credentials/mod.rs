//! Credentials handshake
//!
//! Version negotiation and token exchange with remote platforms. This is
//! the only component that writes platform tokens, status and endpoints.

pub mod dto;
pub mod negotiation;
pub mod service;

pub use dto::{BusinessDetails, Credentials, CredentialsRole, EndpointDto, VersionDetails, VersionInfo};
pub use negotiation::{compare_versions, select_version};
pub use service::{CredentialsService, HandshakeMode};
