//! Command domain entity

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Actionable command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    StartSession,
    StopSession,
    ReserveNow,
    CancelReservation,
    UnlockConnector,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartSession => "START_SESSION",
            Self::StopSession => "STOP_SESSION",
            Self::ReserveNow => "RESERVE_NOW",
            Self::CancelReservation => "CANCEL_RESERVATION",
            Self::UnlockConnector => "UNLOCK_CONNECTOR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "START_SESSION" => Some(Self::StartSession),
            "STOP_SESSION" => Some(Self::StopSession),
            "RESERVE_NOW" => Some(Self::ReserveNow),
            "CANCEL_RESERVATION" => Some(Self::CancelReservation),
            "UNLOCK_CONNECTOR" => Some(Self::UnlockConnector),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandDirection {
    /// Issued by this node to a counterpart.
    LocalOriginated,
    /// Received from a counterpart, executed on local hardware.
    RemoteOriginated,
}

impl CommandDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOriginated => "LOCAL_ORIGINATED",
            Self::RemoteOriginated => "REMOTE_ORIGINATED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "REMOTE_ORIGINATED" => Self::RemoteOriginated,
            _ => Self::LocalOriginated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    /// Result could not be correlated.
    Unknown,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => Self::Pending,
            "ACCEPTED" => Self::Accepted,
            "REJECTED" => Self::Rejected,
            "EXPIRED" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous acknowledgement returned when a command is received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandResponseType {
    NotSupported,
    Rejected,
    Accepted,
    UnknownSession,
}

/// Asynchronous result posted to a command's `response_url`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandResultType {
    Accepted,
    CanceledReservation,
    EvseOccupied,
    EvseInoperative,
    Failed,
    NotSupported,
    Rejected,
    Timeout,
    UnknownReservation,
}

impl CommandResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::Rejected => "REJECTED",
            Self::Accepted => "ACCEPTED",
            Self::UnknownSession => "UNKNOWN_SESSION",
        }
    }
}

impl CommandResultType {
    /// Terminal status this result drives a pending command to
    pub fn to_status(self) -> CommandStatus {
        match self {
            Self::Accepted | Self::CanceledReservation => CommandStatus::Accepted,
            Self::Timeout => CommandStatus::Expired,
            _ => CommandStatus::Rejected,
        }
    }
}

/// Hardware a command acts on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTarget {
    pub location_id: Option<String>,
    pub evse_uid: Option<String>,
    pub connector_id: Option<String>,
    pub session_id: Option<String>,
    pub reservation_id: Option<String>,
    pub token_uid: Option<String>,
    /// RESERVE_NOW only
    pub expiry_date: Option<DateTime<Utc>>,
}

/// A single requested action
#[derive(Debug, Clone)]
pub struct Command {
    pub uid: String,
    pub command_type: CommandType,
    pub direction: CommandDirection,
    pub status: CommandStatus,
    /// Counterpart addressed (local-originated) or issuing (remote-originated)
    pub platform_id: String,
    pub authorization_reference: Option<String>,
    pub target: CommandTarget,
    /// Where the async result is delivered (remote-originated only)
    pub response_url: Option<String>,
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Command {
    pub fn new_pending(
        uid: impl Into<String>,
        command_type: CommandType,
        direction: CommandDirection,
        platform_id: impl Into<String>,
        target: CommandTarget,
        timeout: Duration,
    ) -> Self {
        let requested_at = Utc::now();
        Self {
            uid: uid.into(),
            command_type,
            direction,
            status: CommandStatus::Pending,
            platform_id: platform_id.into(),
            authorization_reference: None,
            target,
            response_url: None,
            message: None,
            requested_at,
            deadline: requested_at + timeout,
            finalized_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == CommandStatus::Pending
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.deadline <= now
    }
}

/// Result of a guarded terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call moved the command out of PENDING.
    Applied(CommandStatus),
    /// Another writer finalized it first; nothing changed.
    AlreadyFinal(CommandStatus),
}

impl TransitionOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_requested_at_plus_timeout() {
        let cmd = Command::new_pending(
            "uid-1",
            CommandType::StartSession,
            CommandDirection::LocalOriginated,
            "P1",
            CommandTarget::default(),
            Duration::seconds(30),
        );
        assert_eq!(cmd.deadline - cmd.requested_at, Duration::seconds(30));
        assert!(!cmd.is_overdue(cmd.requested_at + Duration::seconds(29)));
        assert!(cmd.is_overdue(cmd.deadline));
    }

    #[test]
    fn result_mapping() {
        assert_eq!(CommandResultType::Accepted.to_status(), CommandStatus::Accepted);
        assert_eq!(
            CommandResultType::CanceledReservation.to_status(),
            CommandStatus::Accepted
        );
        assert_eq!(CommandResultType::Timeout.to_status(), CommandStatus::Expired);
        assert_eq!(CommandResultType::EvseOccupied.to_status(), CommandStatus::Rejected);
    }

    #[test]
    fn type_parsing_is_case_insensitive() {
        assert_eq!(CommandType::parse("reserve_now"), Some(CommandType::ReserveNow));
        assert_eq!(CommandType::parse("SELF_DESTRUCT"), None);
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(CommandStatus::Expired.is_terminal());
    }
}
