//! Synchronizable entity abstraction
//!
//! Every module the synchronizer carries (locations, sessions, tariffs,
//! tokens, CDRs, client info) implements [`SyncEntity`]. Storage keeps them
//! as [`StoredEntity`] rows so one repository serves all modules.

pub mod entity;
pub mod merge;
pub mod repository;

pub use entity::{EntityKey, MergeOutcome, StoredEntity, SyncEntity};
pub use merge::merge_patch;
pub use repository::{EntityRepository, EntityUpdate};
