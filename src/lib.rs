//! # Texnouz OCPI node
//!
//! Federation node for the Open Charge Point Interface: registers and
//! connects peer platforms through the credentials handshake, keeps the
//! synchronized modules consistent in both directions and runs remote
//! commands through a guarded lifecycle.
//!
//! ## Architecture
//!
//! - **domain**: aggregates, invariants and repository traits
//! - **application**: handshake, module synchronizers, command lifecycle, scheduler
//! - **infrastructure**: SeaORM storage, in-memory storage, reqwest transport
//! - **interfaces**: OCPI HTTP surface (axum)
//! - **shared**: errors, status codes, pagination, tokens, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use interfaces::http::create_ocpi_router;
