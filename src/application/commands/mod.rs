//! Command and reservation lifecycle
//!
//! PENDING -> ACCEPTED | REJECTED | EXPIRED, decided exactly once per uid.

pub mod dto;
mod ledger;
mod service;

pub use dto::{CommandRequest, CommandResponse, CommandResult};
pub use ledger::CommandLedger;
pub use service::{CommandService, DeadlineSweep, IssuedCommand};
