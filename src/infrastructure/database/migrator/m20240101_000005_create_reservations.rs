//! Create reservations table
//!
//! Reservations made through RESERVE_NOW, in either direction, keyed per
//! counterpart.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reservations::PlatformId).string().not_null())
                    .col(ColumnDef::new(Reservations::ReservationId).string().not_null())
                    .col(ColumnDef::new(Reservations::LocationId).string().not_null())
                    .col(ColumnDef::new(Reservations::EvseUid).string())
                    .col(ColumnDef::new(Reservations::TokenUid).string())
                    .col(
                        ColumnDef::new(Reservations::ExpiryDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Reservations::PlatformId)
                            .col(Reservations::ReservationId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_expiry")
                    .table(Reservations::Table)
                    .col(Reservations::Status)
                    .col(Reservations::ExpiryDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Reservations {
    Table,
    ReservationId,
    PlatformId,
    LocationId,
    EvseUid,
    TokenUid,
    ExpiryDate,
    Status,
    CreatedAt,
}
