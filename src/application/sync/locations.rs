//! Location tree operations
//!
//! Locations are stored as one record per location. A location-level write
//! goes through the plain last-writer-wins merge. EVSE and connector writes
//! are decided against the stored child's own `last_updated` and applied to
//! the stored tree in one atomic read-modify-write, so sibling updates
//! arriving out of order do not shadow each other.

use serde_json::Value;
use tracing::debug;

use super::synchronizer::{object_path, ModuleSynchronizer};
use crate::application::dispatch::Dispatched;
use crate::application::ports::HttpMethod;
use crate::domain::location::{patch_timestamp, Connector, Evse, Location, LocationTarget};
use crate::domain::sync::{EntityKey, MergeOutcome, SyncEntity};
use crate::shared::errors::{DomainError, DomainResult};

impl ModuleSynchronizer<Location> {
    /// PUT at any level of the location tree.
    pub async fn on_remote_location_put(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        location_id: &str,
        target: LocationTarget,
        body: Value,
    ) -> DomainResult<MergeOutcome> {
        let key = EntityKey::new(Location::MODULE, country_code, party_id, location_id);
        self.ensure_remote(platform_id, country_code, party_id, &key).await?;

        match target {
            LocationTarget::Location => {
                let location = Location::from_wire(body)?;
                if location.key() != key {
                    return Err(DomainError::Validation(
                        "Location identifiers in body and path differ".into(),
                    ));
                }
                location.validate()?;
                self.merge(platform_id, &location).await
            }
            LocationTarget::Evse { evse_uid } => {
                let evse: Evse = parse_child("Evse", body)?;
                if evse.uid != evse_uid {
                    return Err(DomainError::invalid("Evse", "uid", "differs from path"));
                }
                self.merge_child(platform_id, &key, |location| {
                    let mut next = location.clone();
                    Ok(next.put_evse(evse.clone()).then_some(next))
                })
                .await
            }
            LocationTarget::Connector {
                evse_uid,
                connector_id,
            } => {
                let connector: Connector = parse_child("Connector", body)?;
                if connector.id != connector_id {
                    return Err(DomainError::invalid("Connector", "id", "differs from path"));
                }
                self.merge_child(platform_id, &key, |location| {
                    let mut next = location.clone();
                    Ok(next.put_connector(&evse_uid, connector.clone())?.then_some(next))
                })
                .await
            }
        }
    }

    /// PATCH at any level; siblings of the addressed child stay as stored.
    pub async fn on_remote_location_patch(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        location_id: &str,
        target: LocationTarget,
        patch: Value,
    ) -> DomainResult<MergeOutcome> {
        let key = EntityKey::new(Location::MODULE, country_code, party_id, location_id);
        self.ensure_remote(platform_id, country_code, party_id, &key).await?;
        let at = patch_timestamp(&patch)?;

        if target == LocationTarget::Location {
            let patched = self.load(&key).await?.patched(&patch)?;
            patched.validate()?;
            return self.merge(platform_id, &patched).await;
        }

        self.merge_child(platform_id, &key, |location| {
            if location.last_updated_at(&target)? >= at {
                return Ok(None);
            }
            let lifted = location.lift_patch(&target, &patch)?;
            location.patched(&lifted).map(Some)
        })
        .await
    }

    /// Atomically apply a child-level change to the stored tree. `apply`
    /// returns `None` when the stored child wins.
    async fn merge_child<F>(&self, platform_id: &str, key: &EntityKey, apply: F) -> DomainResult<MergeOutcome>
    where
        F: Fn(&Location) -> DomainResult<Option<Location>> + Send + Sync,
    {
        let outcome = self
            .repos
            .entities()
            .modify(key, &|stored| {
                let stored = stored.ok_or_else(|| DomainError::not_found(Location::NAME, "id", key.id.clone()))?;
                let current = Location::from_stored(stored)?;
                match apply(&current)? {
                    Some(next) => {
                        next.validate()?;
                        next.to_stored(platform_id).map(Some)
                    }
                    None => Ok(None),
                }
            })
            .await?;
        debug!(platform_id, key = %key, outcome = outcome.as_str(), "Merged location child");
        Ok(outcome)
    }

    /// Read one level of the tree for the receiver GET.
    pub async fn on_remote_location_get(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        location_id: &str,
        target: LocationTarget,
    ) -> DomainResult<Value> {
        let location = self
            .on_remote_get(platform_id, country_code, party_id, location_id)
            .await?;
        match target {
            LocationTarget::Location => location.to_wire(),
            LocationTarget::Evse { evse_uid } => {
                let evse = location
                    .evse(&evse_uid)
                    .ok_or_else(|| DomainError::not_found("Evse", "uid", evse_uid.clone()))?;
                to_value(evse)
            }
            LocationTarget::Connector {
                evse_uid,
                connector_id,
            } => {
                let connector = location.connector(&evse_uid, &connector_id).ok_or_else(|| {
                    DomainError::not_found("Connector", "id", format!("{}/{}", evse_uid, connector_id))
                })?;
                to_value(connector)
            }
        }
    }

    /// Local EVSE changed: store the tree and PUT only the EVSE to receivers.
    pub async fn on_local_evse_changed(
        &self,
        country_code: &str,
        party_id: &str,
        location_id: &str,
        evse: Evse,
    ) -> DomainResult<Dispatched> {
        let key = EntityKey::new(Location::MODULE, country_code, party_id, location_id);
        self.ensure_local(country_code, party_id, &key)?;
        let body = to_value(&evse)?;
        let suffix = format!("{}/{}", object_path(&key), evse.uid);
        self.merge_child(&self.identity.platform_id, &key, |location| {
            let mut next = location.clone();
            Ok(next.put_evse(evse.clone()).then_some(next))
        })
        .await?;
        self.push(&key, HttpMethod::Put, Some(suffix), body, self.error_handler())
            .await
    }

    /// Local connector changed: store the tree and PUT only the connector.
    pub async fn on_local_connector_changed(
        &self,
        country_code: &str,
        party_id: &str,
        location_id: &str,
        evse_uid: &str,
        connector: Connector,
    ) -> DomainResult<Dispatched> {
        let key = EntityKey::new(Location::MODULE, country_code, party_id, location_id);
        self.ensure_local(country_code, party_id, &key)?;
        let body = to_value(&connector)?;
        let suffix = format!("{}/{}/{}", object_path(&key), evse_uid, connector.id);
        self.merge_child(&self.identity.platform_id, &key, |location| {
            let mut next = location.clone();
            Ok(next.put_connector(evse_uid, connector.clone())?.then_some(next))
        })
        .await?;
        self.push(&key, HttpMethod::Put, Some(suffix), body, self.error_handler())
            .await
    }
}

fn parse_child<C: serde::de::DeserializeOwned>(name: &str, body: Value) -> DomainResult<C> {
    serde_json::from_value(body).map_err(|e| DomainError::Validation(format!("{}: {}", name, e)))
}

fn to_value<S: serde::Serialize>(value: &S) -> DomainResult<Value> {
    serde_json::to_value(value).map_err(|e| DomainError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::application::dispatch::default_error_handler;
    use crate::application::registry::PlatformClientRegistry;
    use crate::application::testing::{fixtures, RecordingTransport};
    use crate::domain::location::model::tests::{connector, location};
    use crate::domain::RepositoryProvider;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    async fn setup() -> (ModuleSynchronizer<Location>, Arc<InMemoryRepositoryProvider>) {
        let repos = InMemoryRepositoryProvider::shared();
        repos
            .parties()
            .replace_for_platform("P1", vec![fixtures::remote_party("P1", "DE", "XYZ")])
            .await
            .unwrap();
        let registry = PlatformClientRegistry::shared(Arc::new(RecordingTransport::new()));
        let sync = ModuleSynchronizer::new(
            repos.clone(),
            registry,
            Arc::new(fixtures::identity()),
            default_error_handler(None),
            50,
        );
        (sync, repos)
    }

    fn remote_location(at: chrono::DateTime<Utc>) -> Location {
        let mut l = location("L1", at);
        l.country_code = "DE".into();
        l.party_id = "XYZ".into();
        l
    }

    async fn stored(sync: &ModuleSynchronizer<Location>) -> Location {
        sync.on_remote_get("P1", "DE", "XYZ", "L1").await.unwrap()
    }

    #[tokio::test]
    async fn connector_patch_leaves_siblings_untouched() {
        let (sync, _) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        let original = remote_location(t0);
        sync.on_remote_put("P1", original.clone()).await.unwrap();

        let t1 = t0 + Duration::minutes(1);
        let outcome = sync
            .on_remote_location_patch(
                "P1",
                "DE",
                "XYZ",
                "L1",
                LocationTarget::Connector {
                    evse_uid: "E1".into(),
                    connector_id: "C2".into(),
                },
                json!({"max_amperage": 16, "last_updated": t1}),
            )
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Updated);

        let after = stored(&sync).await;
        assert_eq!(after.connector("E1", "C2").unwrap().max_amperage, Some(16));
        assert_eq!(after.connector("E1", "C1"), original.connector("E1", "C1"));
        assert_eq!(after.evse("E2"), original.evse("E2"));
        let order: Vec<&str> = after.evses[0].connectors.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["C1", "C2"]);
        assert_eq!(after.last_updated, t1);
    }

    #[tokio::test]
    async fn older_sibling_patch_after_newer_one_still_applies() {
        let (sync, _) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        let t1 = t0 + Duration::minutes(1);
        let t2 = t0 + Duration::minutes(2);
        sync.on_remote_put("P1", remote_location(t0)).await.unwrap();

        let e1 = sync
            .on_remote_location_patch(
                "P1",
                "DE",
                "XYZ",
                "L1",
                LocationTarget::Evse { evse_uid: "E1".into() },
                json!({"status": "CHARGING", "last_updated": t2}),
            )
            .await
            .unwrap();
        let e2 = sync
            .on_remote_location_patch(
                "P1",
                "DE",
                "XYZ",
                "L1",
                LocationTarget::Evse { evse_uid: "E2".into() },
                json!({"status": "BLOCKED", "last_updated": t1}),
            )
            .await
            .unwrap();
        assert_eq!((e1, e2), (MergeOutcome::Updated, MergeOutcome::Updated));

        let after = stored(&sync).await;
        assert_eq!(after.evse("E1").unwrap().status, "CHARGING");
        assert_eq!(after.evse("E2").unwrap().status, "BLOCKED");
        assert_eq!(after.evse("E2").unwrap().last_updated, t1);
        assert_eq!(after.last_updated, t2);
    }

    #[tokio::test]
    async fn stale_child_update_is_unchanged() {
        let (sync, _) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        sync.on_remote_put("P1", remote_location(t0)).await.unwrap();
        let target = LocationTarget::Connector {
            evse_uid: "E1".into(),
            connector_id: "C1".into(),
        };

        let t2 = t0 + Duration::minutes(2);
        sync.on_remote_location_patch("P1", "DE", "XYZ", "L1", target.clone(), json!({"max_amperage": 16, "last_updated": t2}))
            .await
            .unwrap();

        let t1 = t0 + Duration::minutes(1);
        let patched = sync
            .on_remote_location_patch("P1", "DE", "XYZ", "L1", target.clone(), json!({"max_amperage": 8, "last_updated": t1}))
            .await
            .unwrap();
        assert_eq!(patched, MergeOutcome::Unchanged);

        let mut stale = connector("C1", t1);
        stale.max_amperage = Some(4);
        let put = sync
            .on_remote_location_put("P1", "DE", "XYZ", "L1", target, serde_json::to_value(stale).unwrap())
            .await
            .unwrap();
        assert_eq!(put, MergeOutcome::Unchanged);

        assert_eq!(stored(&sync).await.connector("E1", "C1").unwrap().max_amperage, Some(16));
    }

    #[tokio::test]
    async fn connector_put_appends_to_existing_evse() {
        let (sync, _) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        sync.on_remote_put("P1", remote_location(t0)).await.unwrap();

        let t1 = t0 + Duration::minutes(1);
        let body = serde_json::to_value(connector("C3", t1)).unwrap();
        sync.on_remote_location_put(
            "P1",
            "DE",
            "XYZ",
            "L1",
            LocationTarget::Connector {
                evse_uid: "E2".into(),
                connector_id: "C3".into(),
            },
            body,
        )
        .await
        .unwrap();

        let after = stored(&sync).await;
        assert_eq!(after.evse("E2").unwrap().connectors.len(), 2);
        assert_eq!(after.evse("E1").unwrap().connectors.len(), 2);
    }

    #[tokio::test]
    async fn patch_on_missing_evse_is_not_found() {
        let (sync, _) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);
        sync.on_remote_put("P1", remote_location(t0)).await.unwrap();

        let err = sync
            .on_remote_location_patch(
                "P1",
                "DE",
                "XYZ",
                "L1",
                LocationTarget::Evse { evse_uid: "E9".into() },
                json!({"status": "CHARGING", "last_updated": Utc::now()}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn put_from_foreign_platform_is_forbidden() {
        let (sync, repos) = setup().await;
        let err = sync
            .on_remote_location_put(
                "P2",
                "DE",
                "XYZ",
                "L1",
                LocationTarget::Location,
                remote_location(Utc::now()).to_wire().unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(ref m) if m.contains("does not belong to remote platform")));
        let key = EntityKey::new(Location::MODULE, "DE", "XYZ", "L1");
        assert!(repos.entities().find(&key).await.unwrap().is_none());
    }
}
