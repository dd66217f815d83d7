//! Create sync_entities table
//!
//! One table for every synchronized module; the payload is the entity's
//! wire form and `last_updated` drives the last-writer-wins merge.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncEntities::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncEntities::Module).string().not_null())
                    .col(ColumnDef::new(SyncEntities::CountryCode).string_len(2).not_null())
                    .col(ColumnDef::new(SyncEntities::PartyId).string_len(3).not_null())
                    .col(ColumnDef::new(SyncEntities::EntityId).string().not_null())
                    .col(ColumnDef::new(SyncEntities::PlatformId).string().not_null())
                    .col(
                        ColumnDef::new(SyncEntities::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncEntities::Payload).json().not_null())
                    .primary_key(
                        Index::create()
                            .col(SyncEntities::Module)
                            .col(SyncEntities::CountryCode)
                            .col(SyncEntities::PartyId)
                            .col(SyncEntities::EntityId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_entities_updated")
                    .table(SyncEntities::Table)
                    .col(SyncEntities::Module)
                    .col(SyncEntities::PlatformId)
                    .col(SyncEntities::LastUpdated)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncEntities::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SyncEntities {
    Table,
    Module,
    CountryCode,
    PartyId,
    EntityId,
    PlatformId,
    LastUpdated,
    Payload,
}
