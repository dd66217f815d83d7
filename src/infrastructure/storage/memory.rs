//! In-memory repositories for development and testing
//!
//! Same contracts as the SeaORM repositories, including the guarded
//! writes: `upsert_if_newer` and `finalize` decide under the DashMap entry
//! lock so concurrent writers see exactly one winner.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::command::{Command, CommandDirection, CommandRepository, CommandStatus};
use crate::domain::module::ModuleId;
use crate::domain::platform::{Party, PartyRepository, Platform, PlatformRepository};
use crate::domain::reservation::{Reservation, ReservationRepository};
use crate::domain::sync::{EntityKey, EntityRepository, EntityUpdate, MergeOutcome, StoredEntity};
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::pagination::{PageRequest, PaginatedResult};

#[derive(Default)]
pub struct InMemoryPlatformRepository {
    platforms: DashMap<String, Platform>,
}

#[async_trait]
impl PlatformRepository for InMemoryPlatformRepository {
    async fn save(&self, platform: Platform) -> DomainResult<()> {
        self.platforms.insert(platform.id.clone(), platform);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Platform>> {
        Ok(self.platforms.get(id).map(|p| p.clone()))
    }

    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Platform>> {
        Ok(self
            .platforms
            .iter()
            .find(|p| !p.is_local && p.accepts_token(token))
            .map(|p| p.clone()))
    }

    async fn find_connected(&self) -> DomainResult<Vec<Platform>> {
        let mut connected: Vec<Platform> = self
            .platforms
            .iter()
            .filter(|p| !p.is_local && p.is_connected())
            .map(|p| p.clone())
            .collect();
        connected.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(connected)
    }

    async fn find_all(&self) -> DomainResult<Vec<Platform>> {
        let mut all: Vec<Platform> = self.platforms.iter().map(|p| p.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        self.platforms.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPartyRepository {
    parties: DashMap<(String, String), Party>,
}

fn party_key(country_code: &str, party_id: &str) -> (String, String) {
    (country_code.to_ascii_uppercase(), party_id.to_ascii_uppercase())
}

#[async_trait]
impl PartyRepository for InMemoryPartyRepository {
    async fn replace_for_platform(&self, platform_id: &str, parties: Vec<Party>) -> DomainResult<()> {
        self.parties.retain(|_, p| p.platform_id != platform_id);
        for party in parties {
            self.parties
                .insert(party_key(&party.country_code, &party.party_id), party);
        }
        Ok(())
    }

    async fn find_by_platform(&self, platform_id: &str) -> DomainResult<Vec<Party>> {
        Ok(self
            .parties
            .iter()
            .filter(|p| p.platform_id == platform_id)
            .map(|p| p.clone())
            .collect())
    }

    async fn find_by_external_id(
        &self,
        country_code: &str,
        party_id: &str,
    ) -> DomainResult<Option<Party>> {
        Ok(self
            .parties
            .get(&party_key(country_code, party_id))
            .map(|p| p.clone()))
    }

    async fn delete(&self, country_code: &str, party_id: &str) -> DomainResult<()> {
        self.parties.remove(&party_key(country_code, party_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEntityRepository {
    entities: DashMap<EntityKey, StoredEntity>,
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn find(&self, key: &EntityKey) -> DomainResult<Option<StoredEntity>> {
        Ok(self.entities.get(key).map(|e| e.clone()))
    }

    async fn upsert_if_newer(&self, record: StoredEntity) -> DomainResult<MergeOutcome> {
        match self.entities.entry(record.key.clone()) {
            Entry::Occupied(mut slot) => {
                if record.last_updated > slot.get().last_updated {
                    slot.insert(record);
                    Ok(MergeOutcome::Updated)
                } else {
                    Ok(MergeOutcome::Unchanged)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(MergeOutcome::Created)
            }
        }
    }

    async fn modify(&self, key: &EntityKey, apply: EntityUpdate<'_>) -> DomainResult<MergeOutcome> {
        match self.entities.entry(key.clone()) {
            Entry::Occupied(mut slot) => match apply(Some(slot.get().clone()))? {
                Some(record) => {
                    slot.insert(record);
                    Ok(MergeOutcome::Updated)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
            Entry::Vacant(slot) => match apply(None)? {
                Some(record) => {
                    slot.insert(record);
                    Ok(MergeOutcome::Created)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
        }
    }

    async fn find_updated(
        &self,
        module: ModuleId,
        platform_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<StoredEntity>> {
        let mut matching: Vec<StoredEntity> = self
            .entities
            .iter()
            .filter(|e| e.key.module == module && e.platform_id == platform_id)
            .filter(|e| from.map_or(true, |f| e.last_updated >= f))
            .filter(|e| to.map_or(true, |t| e.last_updated < t))
            .map(|e| e.clone())
            .collect();
        matching.sort_by(|a, b| {
            a.last_updated
                .cmp(&b.last_updated)
                .then_with(|| a.key.id.cmp(&b.key.id))
        });
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(PaginatedResult::new(items, total, page.offset, page.limit))
    }

    async fn delete(&self, key: &EntityKey) -> DomainResult<()> {
        self.entities.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCommandRepository {
    commands: DashMap<String, Command>,
}

#[async_trait]
impl CommandRepository for InMemoryCommandRepository {
    async fn save(&self, command: Command) -> DomainResult<()> {
        match self.commands.entry(command.uid.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "command {} already exists",
                command.uid
            ))),
            Entry::Vacant(slot) => {
                slot.insert(command);
                Ok(())
            }
        }
    }

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<Command>> {
        Ok(self.commands.get(uid).map(|c| c.clone()))
    }

    async fn finalize(
        &self,
        uid: &str,
        status: CommandStatus,
        message: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(mut command) = self.commands.get_mut(uid) else {
            return Ok(false);
        };
        if command.status != CommandStatus::Pending {
            return Ok(false);
        }
        command.status = status;
        command.message = message;
        command.finalized_at = Some(at);
        Ok(true)
    }

    async fn find_overdue(
        &self,
        direction: CommandDirection,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Command>> {
        Ok(self
            .commands
            .iter()
            .filter(|c| c.direction == direction && c.is_overdue(now))
            .map(|c| c.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: DashMap<(String, String), Reservation>,
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn save(&self, reservation: Reservation) -> DomainResult<()> {
        self.reservations.insert(reservation_key(&reservation), reservation);
        Ok(())
    }

    async fn find_by_id(&self, platform_id: &str, reservation_id: &str) -> DomainResult<Option<Reservation>> {
        let key = (platform_id.to_string(), reservation_id.to_string());
        Ok(self.reservations.get(&key).map(|r| r.clone()))
    }

    async fn cancel(&self, platform_id: &str, reservation_id: &str) -> DomainResult<bool> {
        let key = (platform_id.to_string(), reservation_id.to_string());
        match self.reservations.get_mut(&key) {
            Some(mut reservation) if reservation.is_active() => {
                reservation.cancel();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.is_lapsed(now))
            .map(|r| r.clone())
            .collect())
    }

    async fn update(&self, reservation: Reservation) -> DomainResult<()> {
        let key = reservation_key(&reservation);
        if !self.reservations.contains_key(&key) {
            return Err(DomainError::not_found(
                "Reservation",
                "id",
                reservation.reservation_id,
            ));
        }
        self.reservations.insert(key, reservation);
        Ok(())
    }
}

fn reservation_key(reservation: &Reservation) -> (String, String) {
    (reservation.platform_id.clone(), reservation.reservation_id.clone())
}

/// In-memory implementation of [`RepositoryProvider`]
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    platforms: InMemoryPlatformRepository,
    parties: InMemoryPartyRepository,
    entities: InMemoryEntityRepository,
    commands: InMemoryCommandRepository,
    reservations: InMemoryReservationRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn platforms(&self) -> &dyn PlatformRepository {
        &self.platforms
    }

    fn parties(&self) -> &dyn PartyRepository {
        &self.parties
    }

    fn entities(&self) -> &dyn EntityRepository {
        &self.entities
    }

    fn commands(&self) -> &dyn CommandRepository {
        &self.commands
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }
}
