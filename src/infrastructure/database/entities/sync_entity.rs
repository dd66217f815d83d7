//! Synchronized entity row, shared by every module

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_entities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub module: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub country_code: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub party_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_id: String,

    /// Platform the record originated from
    pub platform_id: String,

    pub last_updated: DateTimeUtc,

    /// Wire representation of the entity
    pub payload: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
