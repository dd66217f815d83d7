//! Hub client info: connection status of parties behind a hub

pub mod model;

pub use model::{ClientInfo, ConnectionStatus};
