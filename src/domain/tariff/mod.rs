//! Tariff aggregate

pub mod model;

pub use model::Tariff;
