//! Tariff domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::module::ModuleId;
use crate::domain::sync::SyncEntity;
use crate::shared::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub country_code: String,
    pub party_id: String,
    pub id: String,
    /// ISO-4217 currency code
    pub currency: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tariff_type: Option<String>,
    /// Price components; kept opaque beyond the non-empty check.
    pub elements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tariff {
    /// Whether the tariff applies at `at`
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date_time.map_or(true, |start| at >= start)
            && self.end_date_time.map_or(true, |end| at < end)
    }
}

impl SyncEntity for Tariff {
    const MODULE: ModuleId = ModuleId::Tariffs;
    const NAME: &'static str = "Tariff";

    fn id(&self) -> &str {
        &self.id
    }

    fn country_code(&self) -> &str {
        &self.country_code
    }

    fn party_id(&self) -> &str {
        &self.party_id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn validate_payload(&self) -> DomainResult<()> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::invalid(
                "Tariff",
                "currency",
                format!("'{}' is not an ISO-4217 code", self.currency),
            ));
        }
        if self.elements.is_empty() {
            return Err(DomainError::invalid("Tariff", "elements", "at least one element required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn tariff() -> Tariff {
        Tariff::from_wire(json!({
            "country_code": "NL",
            "party_id": "ABC",
            "id": "T1",
            "currency": "EUR",
            "type": "REGULAR",
            "elements": [{"price_components": [{"type": "ENERGY", "price": 0.25, "step_size": 1}]}],
            "last_updated": "2024-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn wire_type_field_is_mapped() {
        let t = tariff();
        assert_eq!(t.tariff_type.as_deref(), Some("REGULAR"));
        assert_eq!(t.to_wire().unwrap()["type"], json!("REGULAR"));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn empty_elements_are_rejected() {
        let mut t = tariff();
        t.elements.clear();
        assert!(t.validate().unwrap_err().to_string().contains("Tariff.elements"));
    }

    #[test]
    fn validity_window() {
        let mut t = tariff();
        let now = Utc::now();
        assert!(t.is_valid_at(now));
        t.end_date_time = Some(now - Duration::hours(1));
        assert!(!t.is_valid_at(now));
    }
}
