//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use super::db_err;
use crate::domain::reservation::{Reservation, ReservationRepository, ReservationStatus};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> Reservation {
    Reservation {
        reservation_id: m.reservation_id,
        platform_id: m.platform_id,
        location_id: m.location_id,
        evse_uid: m.evse_uid,
        token_uid: m.token_uid,
        expiry_date: m.expiry_date,
        status: ReservationStatus::from_str(&m.status),
        created_at: m.created_at,
    }
}

fn domain_to_active(r: Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        reservation_id: Set(r.reservation_id),
        platform_id: Set(r.platform_id),
        location_id: Set(r.location_id),
        evse_uid: Set(r.evse_uid),
        token_uid: Set(r.token_uid),
        expiry_date: Set(r.expiry_date),
        status: Set(r.status.as_str().to_string()),
        created_at: Set(r.created_at),
    }
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn save(&self, r: Reservation) -> DomainResult<()> {
        debug!(reservation_id = %r.reservation_id, "Saving reservation");

        let exists = reservation::Entity::find_by_id((r.platform_id.clone(), r.reservation_id.clone()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        let model = domain_to_active(r);
        if exists {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            model.insert(&self.db).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn find_by_id(&self, platform_id: &str, reservation_id: &str) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find_by_id((platform_id.to_string(), reservation_id.to_string()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn cancel(&self, platform_id: &str, reservation_id: &str) -> DomainResult<bool> {
        let result = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Cancelled.as_str()),
            )
            .filter(reservation::Column::PlatformId.eq(platform_id))
            .filter(reservation::Column::ReservationId.eq(reservation_id))
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .filter(reservation::Column::ExpiryDate.lt(now))
            .order_by_asc(reservation::Column::ExpiryDate)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn update(&self, r: Reservation) -> DomainResult<()> {
        debug!(reservation_id = %r.reservation_id, status = %r.status, "Updating reservation");

        let existing = reservation::Entity::find_by_id((r.platform_id.clone(), r.reservation_id.clone()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_none() {
            return Err(DomainError::not_found(
                "Reservation",
                "reservation_id",
                r.reservation_id,
            ));
        }

        domain_to_active(r).update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::repositories::test_db;
    use chrono::Duration;

    #[tokio::test]
    async fn cancel_only_moves_active_reservations() {
        let repo = SeaOrmReservationRepository::new(test_db().await);
        let expiry = Utc::now() + Duration::hours(1);
        repo.save(Reservation::new("R1", "P1", "L1", None, Some("TOKEN-1".into()), expiry))
            .await
            .unwrap();

        assert!(!repo.cancel("P2", "R1").await.unwrap());
        assert!(repo.cancel("P1", "R1").await.unwrap());
        assert!(!repo.cancel("P1", "R1").await.unwrap());
        assert!(!repo.cancel("P1", "R9").await.unwrap());
        let stored = repo.find_by_id("P1", "R1").await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn same_reservation_id_is_kept_per_platform() {
        let repo = SeaOrmReservationRepository::new(test_db().await);
        let expiry = Utc::now() + Duration::hours(1);
        repo.save(Reservation::new("R1", "P1", "L1", None, None, expiry)).await.unwrap();
        repo.save(Reservation::new("R1", "P2", "L7", None, None, expiry)).await.unwrap();

        assert!(repo.cancel("P1", "R1").await.unwrap());
        let other = repo.find_by_id("P2", "R1").await.unwrap().unwrap();
        assert_eq!(other.location_id, "L7");
        assert!(other.is_active());
    }

    #[tokio::test]
    async fn expired_lists_lapsed_active_reservations() {
        let repo = SeaOrmReservationRepository::new(test_db().await);
        let now = Utc::now();
        repo.save(Reservation::new("R1", "P1", "L1", None, None, now - Duration::minutes(5)))
            .await
            .unwrap();
        repo.save(Reservation::new("R2", "P1", "L1", None, None, now + Duration::minutes(5)))
            .await
            .unwrap();

        let lapsed = repo.find_expired(now).await.unwrap();
        assert_eq!(lapsed.len(), 1);
        let mut r1 = lapsed.into_iter().next().unwrap();
        r1.expire();
        repo.update(r1).await.unwrap();
        assert!(repo.find_expired(now).await.unwrap().is_empty());
    }
}
