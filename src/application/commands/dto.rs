//! Wire shapes of the commands module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::command::{CommandResponseType, CommandResultType, CommandTarget, CommandType};
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::validations::validate_id;

/// Body of any command request; which fields are required depends on the type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub response_url: String,
    /// Token object the session or reservation is authorized for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evse_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_reference: Option<String>,
}

impl CommandRequest {
    /// Check that every attribute `command_type` needs is present.
    pub fn validate_for(&self, command_type: CommandType) -> DomainResult<()> {
        if self.response_url.trim().is_empty() {
            return Err(DomainError::invalid("Command", "response_url", "must not be empty"));
        }

        match command_type {
            CommandType::StartSession => {
                require("location_id", &self.location_id)?;
                self.require_token()?;
            }
            CommandType::StopSession => require("session_id", &self.session_id)?,
            CommandType::ReserveNow => {
                require("location_id", &self.location_id)?;
                require("reservation_id", &self.reservation_id)?;
                self.require_token()?;
                if self.expiry_date.is_none() {
                    return Err(DomainError::invalid("Command", "expiry_date", "must be set"));
                }
            }
            CommandType::CancelReservation => require("reservation_id", &self.reservation_id)?,
            CommandType::UnlockConnector => {
                require("location_id", &self.location_id)?;
                require("evse_uid", &self.evse_uid)?;
                require("connector_id", &self.connector_id)?;
            }
        }
        Ok(())
    }

    fn require_token(&self) -> DomainResult<()> {
        match &self.token {
            Some(Value::Object(_)) => Ok(()),
            _ => Err(DomainError::invalid("Command", "token", "must be a token object")),
        }
    }

    /// Token uid from the embedded token object
    pub fn token_uid(&self) -> Option<String> {
        self.token
            .as_ref()
            .and_then(|t| t.get("uid"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn target(&self) -> CommandTarget {
        CommandTarget {
            location_id: self.location_id.clone(),
            evse_uid: self.evse_uid.clone(),
            connector_id: self.connector_id.clone(),
            session_id: self.session_id.clone(),
            reservation_id: self.reservation_id.clone(),
            token_uid: self.token_uid(),
            expiry_date: self.expiry_date,
        }
    }
}

fn require(attribute: &'static str, value: &Option<String>) -> DomainResult<()> {
    match value {
        Some(v) => validate_id("Command", attribute, v),
        None => Err(DomainError::invalid("Command", attribute, "must be set")),
    }
}

/// Synchronous acknowledgement of a command request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: CommandResponseType,
    /// Seconds the receiver will wait before reporting TIMEOUT
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl CommandResponse {
    pub fn accepted(timeout: u64) -> Self {
        Self {
            result: CommandResponseType::Accepted,
            timeout,
            message: None,
        }
    }

    pub fn refused(result: CommandResponseType, timeout: u64, message: impl Into<String>) -> Self {
        Self {
            result,
            timeout,
            message: Some(display_text(message.into())),
        }
    }
}

/// Asynchronous result posted to `response_url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result: CommandResultType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl CommandResult {
    pub fn new(result: CommandResultType, message: Option<String>) -> Self {
        Self {
            result,
            message: message.map(display_text),
        }
    }

    /// Message as plain text, whatever form the counterpart sent
    pub fn message_text(&self) -> Option<String> {
        match &self.message {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => items
                .iter()
                .find_map(|i| i.get("text").and_then(Value::as_str))
                .map(str::to_string),
            Some(other) => other
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(other.to_string())),
        }
    }
}

/// `DisplayText` list with a single English entry
fn display_text(text: String) -> Value {
    serde_json::json!([{ "language": "en", "text": text }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_fields_follow_the_command_type() {
        let mut request = CommandRequest {
            response_url: "https://remote.example/cb".into(),
            reservation_id: Some("R1".into()),
            ..Default::default()
        };
        request.validate_for(CommandType::CancelReservation).unwrap();

        let err = request.validate_for(CommandType::UnlockConnector).unwrap_err();
        assert!(err.to_string().contains("location_id"));

        request.location_id = Some("L1".into());
        request.token = Some(json!("not-an-object"));
        let err = request.validate_for(CommandType::StartSession).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn empty_response_url_is_rejected() {
        let request = CommandRequest {
            session_id: Some("S1".into()),
            ..Default::default()
        };
        assert!(request.validate_for(CommandType::StopSession).is_err());
    }

    #[test]
    fn result_message_accepts_display_text_or_string() {
        let plain: CommandResult =
            serde_json::from_value(json!({"result": "FAILED", "message": "jammed"})).unwrap();
        assert_eq!(plain.message_text().as_deref(), Some("jammed"));
        let listed = CommandResult::new(CommandResultType::Rejected, Some("busy".into()));
        assert_eq!(listed.message_text().as_deref(), Some("busy"));
    }
}
