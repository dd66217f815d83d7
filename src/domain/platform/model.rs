//! Platform and party domain entities

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::module::{InterfaceRole, ModuleId};
use crate::shared::errors::{DomainError, DomainResult};

/// Which interface sides a platform plays in the federation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlatformRole {
    Sender,
    Receiver,
    Both,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "SENDER",
            Self::Receiver => "RECEIVER",
            Self::Both => "BOTH",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "SENDER" => Self::Sender,
            "RECEIVER" => Self::Receiver,
            _ => Self::Both,
        }
    }
}

/// Connection lifecycle of a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlatformStatus {
    /// Known, no handshake yet (or torn down).
    New,
    /// Handshake in flight.
    Registering,
    /// Credentials exchanged, endpoints not yet usable.
    Registered,
    Connected,
    Disabled,
}

impl PlatformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Registering => "REGISTERING",
            Self::Registered => "REGISTERED",
            Self::Connected => "CONNECTED",
            Self::Disabled => "DISABLED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "REGISTERING" => Self::Registering,
            "REGISTERED" => Self::Registered,
            "CONNECTED" => Self::Connected,
            "DISABLED" => Self::Disabled,
            _ => Self::New,
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module endpoint advertised by a platform for one protocol version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub module: ModuleId,
    /// `None` for 2.1.1 endpoints, which carry no role.
    pub role: Option<InterfaceRole>,
    pub version: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(
        module: ModuleId,
        role: Option<InterfaceRole>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            module,
            role,
            version: version.into(),
            url: url.into(),
        }
    }

    fn serves(&self, module: ModuleId, role: InterfaceRole) -> bool {
        self.module == module && self.role.map_or(true, |r| r == role)
    }
}

/// One counterpart network node (or the local node itself)
#[derive(Debug, Clone)]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub role: PlatformRole,
    pub status: PlatformStatus,
    pub is_local: bool,
    /// Pre-shared invite token.
    pub token_a: Option<String>,
    /// Issued by this node to the counterpart.
    pub token_b: Option<String>,
    /// Issued by the counterpart to this node.
    pub token_c: Option<String>,
    /// Counterpart's versions endpoint.
    pub versions_url: Option<String>,
    /// Versions acceptable for this counterpart.
    pub versions: Vec<String>,
    pub current_version: Option<String>,
    pub endpoints: Vec<Endpoint>,
    /// Modules this counterpart cannot push; pulled on the tight schedule.
    pub push_unsupported: Vec<ModuleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Platform {
    pub fn new_remote(
        id: impl Into<String>,
        name: impl Into<String>,
        versions: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            role: PlatformRole::Both,
            status: PlatformStatus::New,
            is_local: false,
            token_a: None,
            token_b: None,
            token_c: None,
            versions_url: None,
            versions,
            current_version: None,
            endpoints: Vec::new(),
            push_unsupported: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == PlatformStatus::Connected
    }

    /// Token used when calling the counterpart.
    pub fn outbound_token(&self) -> Option<&str> {
        self.token_c
            .as_deref()
            .or(self.token_a.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Whether `token` is one this node accepts from the counterpart.
    pub fn accepts_token(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        self.token_a.as_deref() == Some(token) || self.token_b.as_deref() == Some(token)
    }

    pub fn endpoint(&self, module: ModuleId, role: InterfaceRole) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.serves(module, role))
    }

    pub fn supports_push(&self, module: ModuleId) -> bool {
        !self.push_unsupported.contains(&module)
    }

    /// Transition to CONNECTED, enforcing the connection invariant.
    pub fn mark_connected(
        &mut self,
        token_c: String,
        version: String,
        endpoints: Vec<Endpoint>,
    ) -> DomainResult<()> {
        if token_c.is_empty() {
            return Err(DomainError::invalid("Platform", "token_c", "must not be empty"));
        }
        if version.is_empty() {
            return Err(DomainError::invalid("Platform", "current_version", "must not be empty"));
        }
        if endpoints.is_empty() {
            return Err(DomainError::invalid("Platform", "endpoints", "no endpoints advertised"));
        }
        self.token_c = Some(token_c);
        self.current_version = Some(version);
        self.endpoints = endpoints;
        self.status = PlatformStatus::Connected;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Tear the connection down so no stored token stays usable.
    pub fn disconnect(&mut self) {
        self.token_a = None;
        self.token_b = None;
        self.token_c = None;
        self.current_version = None;
        self.endpoints.clear();
        self.status = PlatformStatus::New;
        self.updated_at = Utc::now();
    }
}

/// Business role of a party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartyRole {
    Cpo,
    Emsp,
    Hub,
    Nap,
    Nsp,
    Other,
    Scsp,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpo => "CPO",
            Self::Emsp => "EMSP",
            Self::Hub => "HUB",
            Self::Nap => "NAP",
            Self::Nsp => "NSP",
            Self::Other => "OTHER",
            Self::Scsp => "SCSP",
        }
    }
}

impl FromStr for PartyRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CPO" => Ok(Self::Cpo),
            "EMSP" => Ok(Self::Emsp),
            "HUB" => Ok(Self::Hub),
            "NAP" => Ok(Self::Nap),
            "NSP" => Ok(Self::Nsp),
            "OTHER" => Ok(Self::Other),
            "SCSP" => Ok(Self::Scsp),
            other => Err(DomainError::invalid(
                "Party",
                "role",
                format!("unsupported role '{}'", other),
            )),
        }
    }
}

/// A (country_code, party_id) business entity operating under a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub country_code: String,
    pub party_id: String,
    pub roles: Vec<PartyRole>,
    pub name: Option<String>,
    pub platform_id: String,
}

impl Party {
    pub fn new(
        country_code: impl Into<String>,
        party_id: impl Into<String>,
        roles: Vec<PartyRole>,
        platform_id: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            party_id: party_id.into(),
            roles,
            name: None,
            platform_id: platform_id.into(),
        }
    }

    pub fn matches(&self, country_code: &str, party_id: &str) -> bool {
        self.country_code.eq_ignore_ascii_case(country_code)
            && self.party_id.eq_ignore_ascii_case(party_id)
    }
}

/// This node's own identity
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub platform_id: String,
    pub name: String,
    /// Public base URL, e.g. `https://ocpi.example.com`.
    pub base_url: String,
    /// Supported versions, any order.
    pub versions: Vec<String>,
    pub parties: Vec<Party>,
}

impl LocalIdentity {
    pub fn versions_url(&self) -> String {
        format!("{}/ocpi/versions", self.base_url.trim_end_matches('/'))
    }

    pub fn version_url(&self, version: &str) -> String {
        format!("{}/ocpi/{}", self.base_url.trim_end_matches('/'), version)
    }

    pub fn module_url(&self, version: &str, module: ModuleId) -> String {
        format!("{}/{}", self.version_url(version), module.as_str())
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    pub fn owns_party(&self, country_code: &str, party_id: &str) -> bool {
        self.parties.iter().any(|p| p.matches(country_code, party_id))
    }

    /// Endpoints this node serves under `version`.
    pub fn endpoints(&self, version: &str) -> Vec<Endpoint> {
        let mut endpoints = vec![Endpoint::new(
            ModuleId::Credentials,
            None,
            version,
            self.module_url(version, ModuleId::Credentials),
        )];
        for module in ModuleId::SYNCHRONIZED {
            for role in [InterfaceRole::Sender, InterfaceRole::Receiver] {
                endpoints.push(Endpoint::new(
                    *module,
                    Some(role),
                    version,
                    self.module_url(version, *module),
                ));
            }
        }
        endpoints.push(Endpoint::new(
            ModuleId::Commands,
            Some(InterfaceRole::Receiver),
            version,
            self.module_url(version, ModuleId::Commands),
        ));
        endpoints
    }
}
