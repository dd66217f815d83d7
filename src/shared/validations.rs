//! Structural validation shared by every synchronized module.

use chrono::{DateTime, Utc};

use super::errors::{DomainError, DomainResult};

/// OCPI `CiString(36)` used for most object ids.
pub const MAX_ID_LEN: usize = 36;

pub fn validate_pagination(offset: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(50).clamp(1, 100);
    (offset, limit)
}

pub fn validate_id(entity: &'static str, attribute: &'static str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid(entity, attribute, "must not be empty"));
    }
    validate_max_len(entity, attribute, value, MAX_ID_LEN)
}

pub fn validate_max_len(
    entity: &'static str,
    attribute: &'static str,
    value: &str,
    max: usize,
) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::invalid(
            entity,
            attribute,
            format!("exceeds {} characters", max),
        ));
    }
    Ok(())
}

/// ISO-3166 alpha-2 country code.
pub fn validate_country_code(entity: &'static str, value: &str) -> DomainResult<()> {
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::invalid(
            entity,
            "country_code",
            format!("'{}' is not a 2-letter country code", value),
        ));
    }
    Ok(())
}

/// ISO-15118 party id (3 alphanumerics).
pub fn validate_party_id(entity: &'static str, value: &str) -> DomainResult<()> {
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::invalid(
            entity,
            "party_id",
            format!("'{}' is not a 3-character party id", value),
        ));
    }
    Ok(())
}

/// Rejects timestamps before the Unix epoch and further than a day ahead.
pub fn validate_timestamp(
    entity: &'static str,
    attribute: &'static str,
    value: DateTime<Utc>,
) -> DomainResult<()> {
    if value.timestamp() <= 0 {
        return Err(DomainError::invalid(entity, attribute, "timestamp is not set"));
    }
    if value > Utc::now() + chrono::Duration::days(1) {
        return Err(DomainError::invalid(entity, attribute, "timestamp is in the future"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(validate_pagination(None, None), (0, 50));
        assert_eq!(validate_pagination(Some(10), Some(1000)), (10, 100));
        assert_eq!(validate_pagination(None, Some(0)), (0, 1));
    }

    #[test]
    fn ids() {
        assert!(validate_id("Location", "id", "LOC-1").is_ok());
        assert!(validate_id("Location", "id", "  ").is_err());
        let long = "x".repeat(37);
        let err = validate_id("Location", "id", &long).unwrap_err();
        assert!(err.to_string().contains("Location.id"));
    }

    #[test]
    fn country_and_party() {
        assert!(validate_country_code("Location", "NL").is_ok());
        assert!(validate_country_code("Location", "NLD").is_err());
        assert!(validate_country_code("Location", "1A").is_err());
        assert!(validate_party_id("Location", "ABC").is_ok());
        assert!(validate_party_id("Location", "AB").is_err());
        assert!(validate_party_id("Location", "A-C").is_err());
    }

    #[test]
    fn timestamps() {
        assert!(validate_timestamp("Session", "last_updated", Utc::now()).is_ok());
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert!(validate_timestamp("Session", "last_updated", epoch).is_err());
        let future = Utc::now() + chrono::Duration::days(3);
        assert!(validate_timestamp("Session", "last_updated", future).is_err());
    }
}
