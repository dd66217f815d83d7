//! Platform registry aggregate
//!
//! Remote counterparts and the local node identity, their credentials
//! tokens, negotiated version, endpoint table and the parties they operate.

pub mod model;
pub mod repository;

pub use model::{Endpoint, LocalIdentity, Party, PartyRole, Platform, PlatformRole, PlatformStatus};
pub use repository::{PartyRepository, PlatformRepository};
