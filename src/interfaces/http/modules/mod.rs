//! OCPI module handlers plus request-scoped middleware

pub mod commands;
pub mod credentials;
pub mod locations;
pub mod metrics;
pub mod receivers;
pub mod request_id;
pub mod senders;
pub mod versions;

use crate::domain::LocalIdentity;
use crate::shared::errors::{DomainError, DomainResult};

/// Reject calls addressed to a version this node does not serve.
pub(crate) fn ensure_version(identity: &LocalIdentity, version: &str) -> DomainResult<()> {
    if identity.supports_version(version) {
        Ok(())
    } else {
        Err(DomainError::UnsupportedVersion(version.to_string()))
    }
}
