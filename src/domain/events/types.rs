//! Node events
//!
//! Defines all event types that can be broadcasted to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    PlatformConnected(PlatformConnectedEvent),
    PlatformDisconnected(PlatformDisconnectedEvent),
    CommandFinalized(CommandFinalizedEvent),
    RemoteCommandReceived(RemoteCommandReceivedEvent),
    DispatchFailed(DispatchFailedEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PlatformConnected(_) => "platform_connected",
            Event::PlatformDisconnected(_) => "platform_disconnected",
            Event::CommandFinalized(_) => "command_finalized",
            Event::RemoteCommandReceived(_) => "remote_command_received",
            Event::DispatchFailed(_) => "dispatch_failed",
        }
    }

    pub fn platform_id(&self) -> &str {
        match self {
            Event::PlatformConnected(e) => &e.platform_id,
            Event::PlatformDisconnected(e) => &e.platform_id,
            Event::CommandFinalized(e) => &e.platform_id,
            Event::RemoteCommandReceived(e) => &e.platform_id,
            Event::DispatchFailed(e) => &e.platform_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConnectedEvent {
    pub platform_id: String,
    pub version: String,
    /// true when this node initiated the handshake
    pub initiated: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDisconnectedEvent {
    pub platform_id: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFinalizedEvent {
    pub platform_id: String,
    pub uid: String,
    pub command_type: String,
    pub direction: String,
    pub status: String,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A counterpart asked this node to act on local hardware; the local
/// backend executes it and reports through `on_local_command_set_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommandReceivedEvent {
    pub platform_id: String,
    pub uid: String,
    pub command_type: String,
    pub location_id: Option<String>,
    pub evse_uid: Option<String>,
    pub connector_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchFailedEvent {
    pub platform_id: String,
    pub module: String,
    pub entity_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
