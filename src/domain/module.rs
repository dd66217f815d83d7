//! OCPI module identifiers and interface roles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocol-defined resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleId {
    Credentials,
    Locations,
    Sessions,
    Tariffs,
    Tokens,
    Cdrs,
    #[serde(rename = "hubclientinfo")]
    HubClientInfo,
    Commands,
}

impl ModuleId {
    /// Modules carried by the synchronizer.
    pub const SYNCHRONIZED: &'static [ModuleId] = &[
        Self::Locations,
        Self::Sessions,
        Self::Tariffs,
        Self::Tokens,
        Self::Cdrs,
        Self::HubClientInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Locations => "locations",
            Self::Sessions => "sessions",
            Self::Tariffs => "tariffs",
            Self::Tokens => "tokens",
            Self::Cdrs => "cdrs",
            Self::HubClientInfo => "hubclientinfo",
            Self::Commands => "commands",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credentials" => Ok(Self::Credentials),
            "locations" => Ok(Self::Locations),
            "sessions" => Ok(Self::Sessions),
            "tariffs" => Ok(Self::Tariffs),
            "tokens" => Ok(Self::Tokens),
            "cdrs" => Ok(Self::Cdrs),
            "hubclientinfo" => Ok(Self::HubClientInfo),
            "commands" => Ok(Self::Commands),
            other => Err(format!("unknown module '{}'", other)),
        }
    }
}

/// Which side of a module interface an endpoint implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterfaceRole {
    /// Serves data on request (pull target).
    Sender,
    /// Accepts pushed data.
    Receiver,
}

impl InterfaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "SENDER",
            Self::Receiver => "RECEIVER",
        }
    }
}
