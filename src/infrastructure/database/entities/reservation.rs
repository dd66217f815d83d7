//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub platform_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub reservation_id: String,

    pub location_id: String,

    #[sea_orm(nullable)]
    pub evse_uid: Option<String>,

    #[sea_orm(nullable)]
    pub token_uid: Option<String>,

    pub expiry_date: DateTimeUtc,

    /// Reservation status: ACTIVE, CANCELLED, EXPIRED
    pub status: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
