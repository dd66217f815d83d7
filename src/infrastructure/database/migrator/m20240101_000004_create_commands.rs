//! Create commands table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commands::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Commands::Uid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Commands::CommandType).string().not_null())
                    .col(ColumnDef::new(Commands::Direction).string().not_null())
                    .col(
                        ColumnDef::new(Commands::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Commands::PlatformId).string().not_null())
                    .col(ColumnDef::new(Commands::AuthorizationReference).string())
                    .col(ColumnDef::new(Commands::Target).json().not_null())
                    .col(ColumnDef::new(Commands::ResponseUrl).string())
                    .col(ColumnDef::new(Commands::Message).string())
                    .col(
                        ColumnDef::new(Commands::RequestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Commands::Deadline)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Commands::FinalizedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_commands_pending_deadline")
                    .table(Commands::Table)
                    .col(Commands::Status)
                    .col(Commands::Direction)
                    .col(Commands::Deadline)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Commands::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Commands {
    Table,
    Uid,
    CommandType,
    Direction,
    Status,
    PlatformId,
    AuthorizationReference,
    Target,
    ResponseUrl,
    Message,
    RequestedAt,
    Deadline,
    FinalizedAt,
}
