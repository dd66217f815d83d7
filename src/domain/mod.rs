//! Domain layer
//!
//! Aggregates, their invariants and the repository traits that persist
//! them. Nothing here performs I/O.

pub mod cdr;
pub mod client_info;
pub mod command;
pub mod events;
pub mod location;
pub mod module;
pub mod platform;
pub mod repositories;
pub mod reservation;
pub mod session;
pub mod sync;
pub mod tariff;
pub mod token;

pub use cdr::Cdr;
pub use client_info::ClientInfo;
pub use command::{Command, CommandDirection, CommandStatus, CommandType, TransitionOutcome};
pub use location::{Connector, Evse, Location, LocationTarget};
pub use module::{InterfaceRole, ModuleId};
pub use platform::{Endpoint, LocalIdentity, Party, PartyRole, Platform, PlatformStatus};
pub use repositories::RepositoryProvider;
pub use reservation::{Reservation, ReservationStatus};
pub use session::Session;
pub use sync::{EntityKey, MergeOutcome, StoredEntity, SyncEntity};
pub use tariff::Tariff;
pub use token::Token;

pub use crate::shared::errors::{DomainError, DomainResult};
