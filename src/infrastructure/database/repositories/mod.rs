//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod command_repository;
pub mod entity_repository;
pub mod party_repository;
pub mod platform_repository;
pub mod repository_provider;
pub mod reservation_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use sea_orm::DbErr;

use crate::shared::errors::{DomainError, InfraError};

pub(crate) fn db_err(e: DbErr) -> DomainError {
    InfraError::Database(e).into()
}

pub(crate) fn json_err(e: serde_json::Error) -> DomainError {
    InfraError::Serialization(e).into()
}

#[cfg(test)]
pub(crate) async fn test_db() -> sea_orm::DatabaseConnection {
    use sea_orm_migration::MigratorTrait;

    let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    crate::infrastructure::database::migrator::Migrator::up(&db, None)
        .await
        .unwrap();
    db
}
