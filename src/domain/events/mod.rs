//! Domain events
//!
//! Facts about what happened in the node. The EventBus implementation
//! lives in `application::events`.

pub mod types;

pub use types::{
    CommandFinalizedEvent, DispatchFailedEvent, Event, EventMessage, PlatformConnectedEvent,
    PlatformDisconnectedEvent, RemoteCommandReceivedEvent,
};
