//! Outbound HTTP to remote platforms

mod client;

pub use client::{ReqwestTransport, TransportSettings};
