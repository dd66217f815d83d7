//! SeaORM implementation of EntityRepository
//!
//! Every synchronized module shares the `sync_entities` table. The
//! last-writer-wins decision is taken by the database: a first write is an
//! insert that yields on key conflict, later writes only match a row whose
//! stored `last_updated` is strictly older.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::db_err;
use crate::domain::module::ModuleId;
use crate::domain::sync::{EntityKey, EntityRepository, EntityUpdate, MergeOutcome, StoredEntity};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::sync_entity;
use crate::shared::pagination::{PageRequest, PaginatedResult};

pub struct SeaOrmEntityRepository {
    db: DatabaseConnection,
}

impl SeaOrmEntityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn primary_key(key: &EntityKey) -> (String, String, String, String) {
    (
        key.module.as_str().to_string(),
        key.country_code.clone(),
        key.party_id.clone(),
        key.id.clone(),
    )
}

fn active_model(record: StoredEntity) -> sync_entity::ActiveModel {
    let (module, country_code, party_id, entity_id) = primary_key(&record.key);
    sync_entity::ActiveModel {
        module: Set(module),
        country_code: Set(country_code),
        party_id: Set(party_id),
        entity_id: Set(entity_id),
        platform_id: Set(record.platform_id),
        last_updated: Set(record.last_updated),
        payload: Set(record.payload),
    }
}

fn model_to_domain(m: sync_entity::Model) -> DomainResult<StoredEntity> {
    let module: ModuleId = m.module.parse().map_err(DomainError::Storage)?;
    Ok(StoredEntity {
        key: EntityKey::new(module, &m.country_code, &m.party_id, m.entity_id),
        platform_id: m.platform_id,
        last_updated: m.last_updated,
        payload: m.payload,
    })
}

#[async_trait]
impl EntityRepository for SeaOrmEntityRepository {
    async fn find(&self, key: &EntityKey) -> DomainResult<Option<StoredEntity>> {
        sync_entity::Entity::find_by_id(primary_key(key))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn upsert_if_newer(&self, record: StoredEntity) -> DomainResult<MergeOutcome> {
        let key = record.key.clone();
        let inserted = sync_entity::Entity::insert(active_model(record.clone()))
            .on_conflict(
                OnConflict::columns([
                    sync_entity::Column::Module,
                    sync_entity::Column::CountryCode,
                    sync_entity::Column::PartyId,
                    sync_entity::Column::EntityId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        if inserted > 0 {
            debug!(key = %key, "Entity created");
            return Ok(MergeOutcome::Created);
        }

        let updated = sync_entity::Entity::update_many()
            .set(sync_entity::ActiveModel {
                platform_id: Set(record.platform_id),
                last_updated: Set(record.last_updated),
                payload: Set(record.payload),
                ..Default::default()
            })
            .filter(sync_entity::Column::Module.eq(key.module.as_str()))
            .filter(sync_entity::Column::CountryCode.eq(key.country_code.as_str()))
            .filter(sync_entity::Column::PartyId.eq(key.party_id.as_str()))
            .filter(sync_entity::Column::EntityId.eq(key.id.as_str()))
            .filter(sync_entity::Column::LastUpdated.lt(record.last_updated))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if updated.rows_affected > 0 {
            debug!(key = %key, "Entity updated");
            Ok(MergeOutcome::Updated)
        } else {
            Ok(MergeOutcome::Unchanged)
        }
    }

    async fn modify(&self, key: &EntityKey, apply: EntityUpdate<'_>) -> DomainResult<MergeOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let current = sync_entity::Entity::find_by_id(primary_key(key))
            .one(&txn)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()?;
        let existed = current.is_some();
        let Some(record) = apply(current)? else {
            txn.rollback().await.map_err(db_err)?;
            return Ok(MergeOutcome::Unchanged);
        };

        let outcome = if existed {
            active_model(record).update(&txn).await.map_err(db_err)?;
            MergeOutcome::Updated
        } else {
            active_model(record).insert(&txn).await.map_err(db_err)?;
            MergeOutcome::Created
        };
        txn.commit().await.map_err(db_err)?;
        debug!(key = %key, outcome = outcome.as_str(), "Entity modified");
        Ok(outcome)
    }

    async fn find_updated(
        &self,
        module: ModuleId,
        platform_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<StoredEntity>> {
        let mut query = sync_entity::Entity::find()
            .filter(sync_entity::Column::Module.eq(module.as_str()))
            .filter(sync_entity::Column::PlatformId.eq(platform_id));
        if let Some(from) = from {
            query = query.filter(sync_entity::Column::LastUpdated.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(sync_entity::Column::LastUpdated.lt(to));
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let items = query
            .order_by_asc(sync_entity::Column::LastUpdated)
            .order_by_asc(sync_entity::Column::EntityId)
            .offset(page.offset)
            .limit(page.limit)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(PaginatedResult::new(items, total, page.offset, page.limit))
    }

    async fn delete(&self, key: &EntityKey) -> DomainResult<()> {
        sync_entity::Entity::delete_by_id(primary_key(key))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
