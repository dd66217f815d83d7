//! Command entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commands")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uid: String,

    /// START_SESSION, STOP_SESSION, RESERVE_NOW, CANCEL_RESERVATION, UNLOCK_CONNECTOR
    pub command_type: String,

    /// LOCAL_ORIGINATED or REMOTE_ORIGINATED
    pub direction: String,

    /// PENDING, ACCEPTED, REJECTED, EXPIRED, UNKNOWN
    pub status: String,

    pub platform_id: String,

    #[sea_orm(nullable)]
    pub authorization_reference: Option<String>,

    /// Addressed location/EVSE/connector/session/reservation
    pub target: Json,

    #[sea_orm(nullable)]
    pub response_url: Option<String>,

    #[sea_orm(nullable)]
    pub message: Option<String>,

    pub requested_at: DateTimeUtc,
    pub deadline: DateTimeUtc,

    #[sea_orm(nullable)]
    pub finalized_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
