//! SeaORM implementation of PlatformRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::debug;

use super::{db_err, json_err};
use crate::domain::platform::{Platform, PlatformRepository, PlatformRole, PlatformStatus};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::platform;

pub struct SeaOrmPlatformRepository {
    db: DatabaseConnection,
}

impl SeaOrmPlatformRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: platform::Model) -> DomainResult<Platform> {
    Ok(Platform {
        id: m.id,
        name: m.name,
        role: PlatformRole::from_str(&m.role),
        status: PlatformStatus::from_str(&m.status),
        is_local: m.is_local,
        token_a: m.token_a,
        token_b: m.token_b,
        token_c: m.token_c,
        versions_url: m.versions_url,
        versions: serde_json::from_value(m.versions).map_err(json_err)?,
        current_version: m.current_version,
        endpoints: serde_json::from_value(m.endpoints).map_err(json_err)?,
        push_unsupported: serde_json::from_value(m.push_unsupported).map_err(json_err)?,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(p: Platform) -> DomainResult<platform::ActiveModel> {
    Ok(platform::ActiveModel {
        id: Set(p.id),
        name: Set(p.name),
        role: Set(p.role.as_str().to_string()),
        status: Set(p.status.as_str().to_string()),
        is_local: Set(p.is_local),
        token_a: Set(p.token_a),
        token_b: Set(p.token_b),
        token_c: Set(p.token_c),
        versions_url: Set(p.versions_url),
        versions: Set(serde_json::to_value(&p.versions).map_err(json_err)?),
        current_version: Set(p.current_version),
        endpoints: Set(serde_json::to_value(&p.endpoints).map_err(json_err)?),
        push_unsupported: Set(serde_json::to_value(&p.push_unsupported).map_err(json_err)?),
        created_at: Set(p.created_at),
        updated_at: Set(p.updated_at),
    })
}

// ── PlatformRepository impl ─────────────────────────────────────

#[async_trait]
impl PlatformRepository for SeaOrmPlatformRepository {
    async fn save(&self, p: Platform) -> DomainResult<()> {
        debug!(platform_id = %p.id, status = %p.status, "Saving platform");

        let exists = platform::Entity::find_by_id(p.id.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        let model = domain_to_active(p)?;
        if exists {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            model.insert(&self.db).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Platform>> {
        platform::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Platform>> {
        if token.is_empty() {
            return Ok(None);
        }
        platform::Entity::find()
            .filter(platform::Column::IsLocal.eq(false))
            .filter(
                Condition::any()
                    .add(platform::Column::TokenA.eq(token))
                    .add(platform::Column::TokenB.eq(token)),
            )
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_connected(&self) -> DomainResult<Vec<Platform>> {
        platform::Entity::find()
            .filter(platform::Column::IsLocal.eq(false))
            .filter(platform::Column::Status.eq(PlatformStatus::Connected.as_str()))
            .order_by_asc(platform::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn find_all(&self) -> DomainResult<Vec<Platform>> {
        platform::Entity::find()
            .order_by_asc(platform::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        debug!(platform_id = %id, "Deleting platform");
        platform::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::{InterfaceRole, ModuleId};
    use crate::domain::platform::Endpoint;
    use crate::infrastructure::database::repositories::test_db;

    #[tokio::test]
    async fn tokens_resolve_remote_platforms_only() {
        let repo = SeaOrmPlatformRepository::new(test_db().await);

        let mut local = Platform::new_remote("LOCAL", "Local", vec!["2.2.1".into()]);
        local.is_local = true;
        local.token_b = Some("shared".into());
        repo.save(local).await.unwrap();

        let mut remote = Platform::new_remote("P1", "Remote", vec!["2.2.1".into()]);
        remote.token_a = Some("token-a".into());
        remote.endpoints.push(Endpoint::new(
            ModuleId::Locations,
            Some(InterfaceRole::Sender),
            "2.2.1",
            "https://p1.example/ocpi/2.2.1/locations",
        ));
        remote.push_unsupported.push(ModuleId::Tariffs);
        repo.save(remote).await.unwrap();

        let found = repo.find_by_token("token-a").await.unwrap().unwrap();
        assert_eq!(found.id, "P1");
        assert_eq!(found.endpoints.len(), 1);
        assert_eq!(found.push_unsupported, vec![ModuleId::Tariffs]);
        assert!(repo.find_by_token("shared").await.unwrap().is_none());
        assert!(repo.find_by_token("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let repo = SeaOrmPlatformRepository::new(test_db().await);
        let mut platform = Platform::new_remote("P1", "Remote", vec!["2.2.1".into()]);
        repo.save(platform.clone()).await.unwrap();
        assert!(repo.find_connected().await.unwrap().is_empty());

        platform.status = PlatformStatus::Connected;
        platform.token_c = Some("token-c".into());
        repo.save(platform).await.unwrap();

        let connected = repo.find_connected().await.unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].token_c.as_deref(), Some("token-c"));
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }
}
