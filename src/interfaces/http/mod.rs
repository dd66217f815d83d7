//! OCPI HTTP interface
//!
//! - `common`: OCPI response envelope, error mapping, validated JSON
//! - `middleware`: token authentication of the calling platform
//! - `modules`: request handlers per OCPI module, request id, metrics
//! - `router`: assembles the `/ocpi` routes

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::{create_ocpi_router, AppState};
