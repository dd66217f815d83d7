//! Location aggregate
//!
//! Location owns EVSEs; EVSE owns connectors. Updates at any level merge
//! into the stored tree without touching siblings.

pub mod model;

pub use model::{patch_timestamp, Connector, Evse, GeoLocation, Location, LocationTarget};
