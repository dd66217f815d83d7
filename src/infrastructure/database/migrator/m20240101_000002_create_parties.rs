//! Create parties table

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_platforms::Platforms;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Parties::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Parties::CountryCode).string_len(2).not_null())
                    .col(ColumnDef::new(Parties::PartyId).string_len(3).not_null())
                    .col(ColumnDef::new(Parties::Roles).json().not_null())
                    .col(ColumnDef::new(Parties::Name).string())
                    .col(ColumnDef::new(Parties::PlatformId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(Parties::CountryCode)
                            .col(Parties::PartyId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parties_platform")
                            .from(Parties::Table, Parties::PlatformId)
                            .to(Platforms::Table, Platforms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parties_platform")
                    .table(Parties::Table)
                    .col(Parties::PlatformId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Parties::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Parties {
    Table,
    CountryCode,
    PartyId,
    Roles,
    Name,
    PlatformId,
}
