//! Repository traits for the domain layer
//!
//! `RepositoryProvider` is the unified access point to every
//! per-aggregate repository. Each component only writes the slice it owns:
//! credentials write platforms/parties, synchronizers write entities,
//! the command manager writes commands/reservations.

use super::command::CommandRepository;
use super::platform::{PartyRepository, PlatformRepository};
use super::reservation::ReservationRepository;
use super::sync::EntityRepository;

pub use crate::shared::errors::DomainResult;

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let platform = repos.platforms().find_by_id("P1").await?;
///     let cmd = repos.commands().find_by_uid("c0ffee").await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn platforms(&self) -> &dyn PlatformRepository;
    fn parties(&self) -> &dyn PartyRepository;
    fn entities(&self) -> &dyn EntityRepository;
    fn commands(&self) -> &dyn CommandRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
}
