//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::command::CommandRepository;
use crate::domain::platform::{PartyRepository, PlatformRepository};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::ReservationRepository;
use crate::domain::sync::EntityRepository;

use super::command_repository::SeaOrmCommandRepository;
use super::entity_repository::SeaOrmEntityRepository;
use super::party_repository::SeaOrmPartyRepository;
use super::platform_repository::SeaOrmPlatformRepository;
use super::reservation_repository::SeaOrmReservationRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let platform = repos.platforms().find_by_token(token).await?;
/// let overdue = repos.commands().find_overdue(CommandDirection::LocalOriginated, now).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    platforms: SeaOrmPlatformRepository,
    parties: SeaOrmPartyRepository,
    entities: SeaOrmEntityRepository,
    commands: SeaOrmCommandRepository,
    reservations: SeaOrmReservationRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            platforms: SeaOrmPlatformRepository::new(db.clone()),
            parties: SeaOrmPartyRepository::new(db.clone()),
            entities: SeaOrmEntityRepository::new(db.clone()),
            commands: SeaOrmCommandRepository::new(db.clone()),
            reservations: SeaOrmReservationRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
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
