//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::Reservation;
use crate::shared::errors::DomainResult;

/// Reservations are keyed by `(platform_id, reservation_id)`: ids are only
/// unique within the counterpart that issued them.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert or replace a reservation
    async fn save(&self, reservation: Reservation) -> DomainResult<()>;

    async fn find_by_id(&self, platform_id: &str, reservation_id: &str) -> DomainResult<Option<Reservation>>;

    /// ACTIVE -> CANCELLED; `false` when the reservation was not active
    async fn cancel(&self, platform_id: &str, reservation_id: &str) -> DomainResult<bool>;

    /// ACTIVE reservations whose expiry_date lies before `now`
    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    async fn update(&self, reservation: Reservation) -> DomainResult<()>;
}
