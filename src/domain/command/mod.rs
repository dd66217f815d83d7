//! Command aggregate
//!
//! Asynchronous cross-platform action requests and their one-shot
//! PENDING -> terminal state machine.

pub mod model;
pub mod repository;

pub use model::{
    Command, CommandDirection, CommandResponseType, CommandResultType, CommandStatus,
    CommandTarget, CommandType, TransitionOutcome,
};
pub use repository::CommandRepository;
