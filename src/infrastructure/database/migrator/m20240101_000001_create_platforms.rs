//! Create platforms table
//!
//! Local and remote platforms with tokens, negotiated version and the
//! counterpart's endpoint table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Platforms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Platforms::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Platforms::Name).string().not_null())
                    .col(
                        ColumnDef::new(Platforms::Role)
                            .string()
                            .not_null()
                            .default("BOTH"),
                    )
                    .col(
                        ColumnDef::new(Platforms::Status)
                            .string()
                            .not_null()
                            .default("NEW"),
                    )
                    .col(
                        ColumnDef::new(Platforms::IsLocal)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Platforms::TokenA).string())
                    .col(ColumnDef::new(Platforms::TokenB).string())
                    .col(ColumnDef::new(Platforms::TokenC).string())
                    .col(ColumnDef::new(Platforms::VersionsUrl).string())
                    .col(ColumnDef::new(Platforms::Versions).json().not_null())
                    .col(ColumnDef::new(Platforms::CurrentVersion).string())
                    .col(ColumnDef::new(Platforms::Endpoints).json().not_null())
                    .col(ColumnDef::new(Platforms::PushUnsupported).json().not_null())
                    .col(
                        ColumnDef::new(Platforms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Platforms::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_platforms_status")
                    .table(Platforms::Table)
                    .col(Platforms::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Platforms::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Platforms {
    Table,
    Id,
    Name,
    Role,
    Status,
    IsLocal,
    TokenA,
    TokenB,
    TokenC,
    VersionsUrl,
    Versions,
    CurrentVersion,
    Endpoints,
    PushUnsupported,
    CreatedAt,
    UpdatedAt,
}
