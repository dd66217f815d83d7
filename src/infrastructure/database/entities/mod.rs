//! Database entities module

pub mod command;
pub mod party;
pub mod platform;
pub mod reservation;
pub mod sync_entity;

pub use command::Entity as Command;
pub use party::Entity as Party;
pub use platform::Entity as Platform;
pub use reservation::Entity as Reservation;
pub use sync_entity::Entity as SyncEntity;
