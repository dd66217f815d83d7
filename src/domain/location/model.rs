//! Location, EVSE and connector entities

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::module::ModuleId;
use crate::domain::sync::SyncEntity;
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::validations::{validate_id, validate_max_len, validate_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_voltage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amperage: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tariff_ids: Vec<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evse {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub connectors: Vec<Connector>,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Evse {
    pub fn connector(&self, id: &str) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country_code: String,
    pub party_id: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub evses: Vec<Evse>,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Level of the location tree an inbound request addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationTarget {
    Location,
    Evse { evse_uid: String },
    Connector { evse_uid: String, connector_id: String },
}

impl Location {
    pub fn evse(&self, uid: &str) -> Option<&Evse> {
        self.evses.iter().find(|e| e.uid == uid)
    }

    pub fn connector(&self, evse_uid: &str, connector_id: &str) -> Option<&Connector> {
        self.evse(evse_uid).and_then(|e| e.connector(connector_id))
    }

    /// Replace (or append) one EVSE, keeping the position of siblings.
    ///
    /// Returns `false` and leaves the tree untouched when the stored EVSE is
    /// at least as recent.
    pub fn put_evse(&mut self, evse: Evse) -> bool {
        let at = evse.last_updated;
        match self.evses.iter_mut().find(|e| e.uid == evse.uid) {
            Some(slot) if slot.last_updated >= at => return false,
            Some(slot) => *slot = evse,
            None => self.evses.push(evse),
        }
        self.last_updated = self.last_updated.max(at);
        true
    }

    /// Replace (or append) one connector of an existing EVSE, under the same
    /// rule as [`Location::put_evse`].
    pub fn put_connector(&mut self, evse_uid: &str, connector: Connector) -> DomainResult<bool> {
        let at = connector.last_updated;
        let evse = self
            .evses
            .iter_mut()
            .find(|e| e.uid == evse_uid)
            .ok_or_else(|| DomainError::not_found("Evse", "uid", evse_uid))?;
        match evse.connectors.iter_mut().find(|c| c.id == connector.id) {
            Some(slot) if slot.last_updated >= at => return Ok(false),
            Some(slot) => *slot = connector,
            None => evse.connectors.push(connector),
        }
        evse.last_updated = evse.last_updated.max(at);
        self.last_updated = self.last_updated.max(at);
        Ok(true)
    }

    /// `last_updated` of the addressed level, if it exists.
    pub fn last_updated_at(&self, target: &LocationTarget) -> DomainResult<DateTime<Utc>> {
        match target {
            LocationTarget::Location => Ok(self.last_updated),
            LocationTarget::Evse { evse_uid } => self
                .evse(evse_uid)
                .map(|e| e.last_updated)
                .ok_or_else(|| DomainError::not_found("Evse", "uid", evse_uid.clone())),
            LocationTarget::Connector {
                evse_uid,
                connector_id,
            } => self
                .connector(evse_uid, connector_id)
                .map(|c| c.last_updated)
                .ok_or_else(|| {
                    DomainError::not_found("Connector", "id", format!("{}/{}", evse_uid, connector_id))
                }),
        }
    }

    /// Lift a patch addressed at `target` to a location-level patch.
    ///
    /// The addressed child must already exist. Ancestors take the later of
    /// their stored `last_updated` and the patch's.
    pub fn lift_patch(&self, target: &LocationTarget, patch: &Value) -> DomainResult<Value> {
        let at = patch_timestamp(patch)?;
        // existence check
        self.last_updated_at(target)?;
        let location_at = self.last_updated.max(at);

        match target {
            LocationTarget::Location => Ok(patch.clone()),
            LocationTarget::Evse { evse_uid } => {
                let mut child = patch.clone();
                child["uid"] = json!(evse_uid);
                Ok(json!({ "evses": [child], "last_updated": location_at }))
            }
            LocationTarget::Connector {
                evse_uid,
                connector_id,
            } => {
                let evse_at = self.evse(evse_uid).map_or(at, |e| e.last_updated.max(at));
                let mut child = patch.clone();
                child["id"] = json!(connector_id);
                Ok(json!({
                    "evses": [{
                        "uid": evse_uid,
                        "connectors": [child],
                        "last_updated": evse_at,
                    }],
                    "last_updated": location_at,
                }))
            }
        }
    }
}

/// `last_updated` carried by a PATCH body.
pub fn patch_timestamp(patch: &Value) -> DomainResult<DateTime<Utc>> {
    let raw = patch
        .get("last_updated")
        .cloned()
        .ok_or_else(|| DomainError::invalid("Location", "last_updated", "required in PATCH"))?;
    serde_json::from_value(raw)
        .map_err(|e| DomainError::invalid("Location", "last_updated", e.to_string()))
}

impl SyncEntity for Location {
    const MODULE: ModuleId = ModuleId::Locations;
    const NAME: &'static str = "Location";
    const KEYED_COLLECTIONS: &'static [(&'static str, &'static str)] =
        &[("evses", "uid"), ("connectors", "id")];

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
        if let Some(name) = &self.name {
            validate_max_len("Location", "name", name, 255)?;
        }
        if let Some(address) = &self.address {
            validate_max_len("Location", "address", address, 45)?;
        }
        let mut evse_uids = HashSet::new();
        for evse in &self.evses {
            validate_id("Evse", "uid", &evse.uid)?;
            validate_timestamp("Evse", "last_updated", evse.last_updated)?;
            if !evse_uids.insert(evse.uid.as_str()) {
                return Err(DomainError::invalid("Evse", "uid", format!("duplicate '{}'", evse.uid)));
            }
            let mut connector_ids = HashSet::new();
            for connector in &evse.connectors {
                validate_id("Connector", "id", &connector.id)?;
                validate_timestamp("Connector", "last_updated", connector.last_updated)?;
                if !connector_ids.insert(connector.id.as_str()) {
                    return Err(DomainError::invalid(
                        "Connector",
                        "id",
                        format!("duplicate '{}' in EVSE {}", connector.id, evse.uid),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn connector(id: &str, at: DateTime<Utc>) -> Connector {
        Connector {
            id: id.into(),
            standard: Some("IEC_62196_T2".into()),
            format: Some("SOCKET".into()),
            power_type: Some("AC_3_PHASE".into()),
            max_voltage: Some(230),
            max_amperage: Some(32),
            tariff_ids: vec![],
            last_updated: at,
            extra: Map::new(),
        }
    }

    pub(crate) fn evse(uid: &str, connector_ids: &[&str], at: DateTime<Utc>) -> Evse {
        Evse {
            uid: uid.into(),
            evse_id: None,
            status: "AVAILABLE".into(),
            connectors: connector_ids.iter().map(|id| connector(id, at)).collect(),
            last_updated: at,
            extra: Map::new(),
        }
    }

    pub(crate) fn location(id: &str, at: DateTime<Utc>) -> Location {
        Location {
            country_code: "NL".into(),
            party_id: "ABC".into(),
            id: id.into(),
            name: Some("Station".into()),
            address: Some("Main street 1".into()),
            city: Some("Amsterdam".into()),
            coordinates: None,
            time_zone: Some("Europe/Amsterdam".into()),
            evses: vec![evse("E1", &["C1", "C2"], at), evse("E2", &["C1"], at)],
            last_updated: at,
            extra: Map::new(),
        }
    }

    #[test]
    fn valid_location_passes() {
        let loc = location("L1", Utc::now() - Duration::minutes(5));
        assert!(loc.validate().is_ok());
    }

    #[test]
    fn duplicate_evse_uid_is_rejected() {
        let at = Utc::now() - Duration::minutes(5);
        let mut loc = location("L1", at);
        loc.evses.push(evse("E1", &[], at));
        let err = loc.validate().unwrap_err();
        assert!(err.to_string().contains("Evse.uid"));
    }

    #[test]
    fn connector_patch_leaves_siblings_untouched() {
        let at = Utc::now() - Duration::minutes(10);
        let loc = location("L1", at);
        let later = at + Duration::minutes(5);
        let target = LocationTarget::Connector {
            evse_uid: "E1".into(),
            connector_id: "C2".into(),
        };
        let lifted = loc
            .lift_patch(&target, &json!({"max_voltage": 400, "last_updated": later}))
            .unwrap();
        let patched = loc.patched(&lifted).unwrap();

        assert_eq!(patched.connector("E1", "C2").unwrap().max_voltage, Some(400));
        assert_eq!(patched.connector("E1", "C1"), loc.connector("E1", "C1"));
        assert_eq!(patched.evse("E2"), loc.evse("E2"));
        assert_eq!(patched.evses[0].uid, "E1");
        assert_eq!(patched.last_updated, later);
    }

    #[test]
    fn patch_of_missing_child_is_not_found() {
        let loc = location("L1", Utc::now());
        let target = LocationTarget::Evse { evse_uid: "E9".into() };
        let err = loc
            .lift_patch(&target, &json!({"status": "BLOCKED", "last_updated": Utc::now()}))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Evse", .. }));
    }

    #[test]
    fn patch_without_timestamp_is_invalid() {
        let loc = location("L1", Utc::now());
        let err = loc
            .lift_patch(&LocationTarget::Location, &json!({"name": "X"}))
            .unwrap_err();
        assert!(err.to_string().contains("last_updated"));
    }

    #[test]
    fn put_connector_replaces_in_place() {
        let at = Utc::now() - Duration::minutes(10);
        let mut loc = location("L1", at);
        let mut c = connector("C1", at + Duration::minutes(1));
        c.max_amperage = Some(63);
        assert!(loc.put_connector("E1", c).unwrap());
        assert_eq!(loc.evses[0].connectors[0].max_amperage, Some(63));
        assert_eq!(loc.evses[0].connectors.len(), 2);
        assert!(loc.put_connector("E9", connector("C1", at)).is_err());
    }

    #[test]
    fn stale_child_put_is_ignored_even_when_location_is_older() {
        let at = Utc::now() - Duration::minutes(10);
        let mut loc = location("L1", at);
        let mut newer = evse("E1", &["C1"], at + Duration::minutes(2));
        newer.status = "CHARGING".into();
        assert!(loc.put_evse(newer));

        let mut stale = evse("E1", &["C1"], at + Duration::minutes(1));
        stale.status = "BLOCKED".into();
        assert!(!loc.put_evse(stale));
        assert_eq!(loc.evse("E1").unwrap().status, "CHARGING");

        let mut sibling = evse("E2", &["C1"], at + Duration::minutes(1));
        sibling.status = "BLOCKED".into();
        assert!(loc.put_evse(sibling));
        assert_eq!(loc.evse("E2").unwrap().status, "BLOCKED");
        assert_eq!(loc.last_updated, at + Duration::minutes(2));
    }

    #[test]
    fn lifted_patch_never_moves_ancestors_back() {
        let at = Utc::now() - Duration::minutes(10);
        let mut loc = location("L1", at);
        loc.last_updated = at + Duration::minutes(5);
        let earlier = at + Duration::minutes(1);
        let target = LocationTarget::Evse { evse_uid: "E2".into() };
        let lifted = loc
            .lift_patch(&target, &json!({"status": "BLOCKED", "last_updated": earlier}))
            .unwrap();
        let patched = loc.patched(&lifted).unwrap();

        assert_eq!(patched.evse("E2").unwrap().status, "BLOCKED");
        assert_eq!(patched.evse("E2").unwrap().last_updated, earlier);
        assert_eq!(patched.last_updated, at + Duration::minutes(5));
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let at = Utc::now();
        let mut wire = location("L1", at).to_wire().unwrap();
        wire["parking_type"] = json!("ON_STREET");
        let loc = Location::from_wire(wire).unwrap();
        assert_eq!(loc.extra.get("parking_type"), Some(&json!("ON_STREET")));
        assert_eq!(loc.to_wire().unwrap()["parking_type"], json!("ON_STREET"));
    }
}
