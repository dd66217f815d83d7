//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_platforms;
mod m20240101_000002_create_parties;
mod m20240101_000003_create_sync_entities;
mod m20240101_000004_create_commands;
mod m20240101_000005_create_reservations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_platforms::Migration),
            Box::new(m20240101_000002_create_parties::Migration),
            Box::new(m20240101_000003_create_sync_entities::Migration),
            Box::new(m20240101_000004_create_commands::Migration),
            Box::new(m20240101_000005_create_reservations::Migration),
        ]
    }
}
