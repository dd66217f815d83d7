//! Application ports (hexagonal architecture boundaries)
//!
//! Outbound ports towards remote platforms live here; the HTTP
//! implementation is in `infrastructure::http`.

pub mod outbound;

pub use outbound::{HttpMethod, OcpiRequest, OcpiTransport, RemoteResponse, SharedTransport};
