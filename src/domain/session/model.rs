//! Session domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::module::ModuleId;
use crate::domain::sync::SyncEntity;
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::validations::validate_id;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Invalid,
    Pending,
    Reservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub country_code: String,
    pub party_id: String,
    pub id: String,
    pub start_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
    /// Energy delivered so far, kWh
    pub kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_reference: Option<String>,
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evse_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    pub currency: String,
    pub status: SessionStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

impl SyncEntity for Session {
    const MODULE: ModuleId = ModuleId::Sessions;
    const NAME: &'static str = "Session";

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
        validate_id("Session", "location_id", &self.location_id)?;
        if self.kwh < 0.0 || !self.kwh.is_finite() {
            return Err(DomainError::invalid("Session", "kwh", "must be a non-negative number"));
        }
        if let Some(end) = self.end_date_time {
            if end < self.start_date_time {
                return Err(DomainError::invalid(
                    "Session",
                    "end_date_time",
                    "precedes start_date_time",
                ));
            }
        }
        if self.currency.len() != 3 {
            return Err(DomainError::invalid("Session", "currency", "must be ISO-4217"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn session() -> Session {
        let start = Utc::now() - Duration::hours(1);
        Session {
            country_code: "DE".into(),
            party_id: "EMS".into(),
            id: "S1".into(),
            start_date_time: start,
            end_date_time: None,
            kwh: 4.2,
            auth_method: Some("WHITELIST".into()),
            authorization_reference: None,
            location_id: "L1".into(),
            evse_uid: Some("E1".into()),
            connector_id: Some("1".into()),
            currency: "EUR".into(),
            status: SessionStatus::Active,
            last_updated: start,
            extra: Map::new(),
        }
    }

    #[test]
    fn active_session_validates() {
        let s = session();
        assert!(s.is_active());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut s = session();
        s.end_date_time = Some(s.start_date_time - Duration::minutes(1));
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("Session.end_date_time"));
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let s = session();
        let later = s.last_updated + Duration::minutes(5);
        let patched = s
            .patched(&json!({"kwh": 7.5, "status": "COMPLETED", "last_updated": later}))
            .unwrap();
        assert_eq!(patched.kwh, 7.5);
        assert_eq!(patched.status, SessionStatus::Completed);
        assert_eq!(patched.location_id, "L1");
        assert_eq!(patched.evse_uid.as_deref(), Some("E1"));
    }
}
