use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::module::ModuleId;
use crate::domain::platform::PartyRole;
use crate::domain::sync::SyncEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Connected,
    Offline,
    Planned,
    Suspended,
}

/// Connection state of one party, keyed by the party itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub country_code: String,
    pub party_id: String,
    pub role: PartyRole,
    pub status: ConnectionStatus,
    pub last_updated: DateTime<Utc>,
}

impl SyncEntity for ClientInfo {
    const MODULE: ModuleId = ModuleId::HubClientInfo;
    const NAME: &'static str = "ClientInfo";

    fn id(&self) -> &str {
        &self.party_id
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_by_party() {
        let info = ClientInfo::from_wire(json!({
            "country_code": "BE",
            "party_id": "HUB",
            "role": "HUB",
            "status": "CONNECTED",
            "last_updated": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(info.id(), "HUB");
        assert_eq!(info.key().to_string(), "hubclientinfo/BE/HUB/HUB");
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = ClientInfo::from_wire(json!({
            "country_code": "BE",
            "party_id": "HUB",
            "role": "HUB",
            "status": "GONE",
            "last_updated": "2024-03-01T10:00:00Z"
        }))
        .unwrap_err();
        assert!(matches!(err, crate::shared::errors::DomainError::Validation(_)));
    }
}
