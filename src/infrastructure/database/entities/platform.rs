//! Platform entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "platforms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    /// SENDER, RECEIVER or BOTH
    pub role: String,

    /// NEW, REGISTERING, REGISTERED, CONNECTED, DISABLED
    pub status: String,

    pub is_local: bool,

    #[sea_orm(nullable)]
    pub token_a: Option<String>,
    #[sea_orm(nullable)]
    pub token_b: Option<String>,
    #[sea_orm(nullable)]
    pub token_c: Option<String>,

    #[sea_orm(nullable)]
    pub versions_url: Option<String>,

    /// JSON array of version strings
    pub versions: Json,

    #[sea_orm(nullable)]
    pub current_version: Option<String>,

    /// JSON array of endpoints
    pub endpoints: Json,

    /// JSON array of module ids
    pub push_unsupported: Json,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::party::Entity")]
    Parties,
}

impl Related<super::party::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parties.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
