//! Charge detail record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::module::ModuleId;
use crate::domain::sync::SyncEntity;
use crate::shared::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cdr {
    pub country_code: String,
    pub party_id: String,
    pub id: String,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub currency: String,
    /// kWh
    pub total_energy: f64,
    /// Plain number in 2.1.1, price object in 2.2.
    pub total_cost: Value,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncEntity for Cdr {
    const MODULE: ModuleId = ModuleId::Cdrs;
    const NAME: &'static str = "Cdr";
    const PUSH_BY_POST: bool = true;

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
        if self.end_date_time < self.start_date_time {
            return Err(DomainError::invalid("Cdr", "end_date_time", "precedes start_date_time"));
        }
        if self.total_energy < 0.0 || !self.total_energy.is_finite() {
            return Err(DomainError::invalid("Cdr", "total_energy", "must be a non-negative number"));
        }
        if self.currency.len() != 3 {
            return Err(DomainError::invalid("Cdr", "currency", "must be ISO-4217"));
        }
        Ok(())
    }
}
