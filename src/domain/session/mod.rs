//! Charging session aggregate

pub mod model;

pub use model::{Session, SessionStatus};
