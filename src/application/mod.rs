pub mod commands;
pub mod credentials;
pub mod dispatch;
pub mod events;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use commands::{CommandRequest, CommandResponse, CommandResult, CommandService};
pub use credentials::{CredentialsService, HandshakeMode};
pub use dispatch::{default_error_handler, DispatchFailure, Dispatched, ErrorHandler};
pub use events::{create_event_bus, Event, EventBus, EventSubscriber, SharedEventBus};
pub use ports::{HttpMethod, OcpiRequest, OcpiTransport, RemoteResponse, SharedTransport};
pub use registry::{PlatformClientRegistry, RemoteClient, SharedClientRegistry};
pub use scheduler::{Scheduler, SchedulerSettings};
pub use sync::{ModuleSynchronizer, SyncReport, SynchronizerFor, Synchronizers};
