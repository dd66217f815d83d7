//! SeaORM implementation of PartyRepository

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::{db_err, json_err};
use crate::domain::platform::{Party, PartyRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::party;

pub struct SeaOrmPartyRepository {
    db: DatabaseConnection,
}

impl SeaOrmPartyRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: party::Model) -> DomainResult<Party> {
    Ok(Party {
        country_code: m.country_code,
        party_id: m.party_id,
        roles: serde_json::from_value(m.roles).map_err(json_err)?,
        name: m.name,
        platform_id: m.platform_id,
    })
}

#[async_trait]
impl PartyRepository for SeaOrmPartyRepository {
    async fn replace_for_platform(&self, platform_id: &str, parties: Vec<Party>) -> DomainResult<()> {
        debug!(platform_id = %platform_id, count = parties.len(), "Replacing parties");

        let mut rows = Vec::with_capacity(parties.len());
        for p in parties {
            rows.push(party::ActiveModel {
                country_code: Set(p.country_code.to_ascii_uppercase()),
                party_id: Set(p.party_id.to_ascii_uppercase()),
                roles: Set(serde_json::to_value(&p.roles).map_err(json_err)?),
                name: Set(p.name),
                platform_id: Set(p.platform_id),
            });
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        party::Entity::delete_many()
            .filter(party::Column::PlatformId.eq(platform_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if !rows.is_empty() {
            party::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([party::Column::CountryCode, party::Column::PartyId])
                        .update_columns([
                            party::Column::Roles,
                            party::Column::Name,
                            party::Column::PlatformId,
                        ])
                        .to_owned(),
                )
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }
        txn.commit().await.map_err(db_err)
    }

    async fn find_by_platform(&self, platform_id: &str) -> DomainResult<Vec<Party>> {
        party::Entity::find()
            .filter(party::Column::PlatformId.eq(platform_id))
            .order_by_asc(party::Column::CountryCode)
            .order_by_asc(party::Column::PartyId)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn find_by_external_id(
        &self,
        country_code: &str,
        party_id: &str,
    ) -> DomainResult<Option<Party>> {
        party::Entity::find_by_id((
            country_code.to_ascii_uppercase(),
            party_id.to_ascii_uppercase(),
        ))
        .one(&self.db)
        .await
        .map_err(db_err)?
        .map(model_to_domain)
        .transpose()
    }

    async fn delete(&self, country_code: &str, party_id: &str) -> DomainResult<()> {
        party::Entity::delete_by_id((
            country_code.to_ascii_uppercase(),
            party_id.to_ascii_uppercase(),
        ))
        .exec(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
