//! Credentials and versions wire objects

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::domain::module::{InterfaceRole, ModuleId};
use crate::domain::platform::{Endpoint, Party, PartyRole};
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::validations::{validate_country_code, validate_party_id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BusinessDetails {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CredentialsRole {
    pub role: String,
    #[validate(nested)]
    pub business_details: BusinessDetails,
    #[validate(length(equal = 3, message = "party_id must be 3 characters"))]
    pub party_id: String,
    #[validate(length(equal = 2, message = "country_code must be 2 characters"))]
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 64, message = "token is required"))]
    pub token: String,
    /// Versions endpoint of the platform these credentials describe
    #[validate(length(min = 1, max = 255, message = "url is required"))]
    pub url: String,
    #[validate(length(min = 1, message = "at least one role is required"), nested)]
    pub roles: Vec<CredentialsRole>,
}

impl Credentials {
    /// Structural validation plus role parsing; never touches the network.
    pub fn check(&self) -> DomainResult<()> {
        self.validate()
            .map_err(|e| DomainError::Validation(format!("credentials: {}", e)))?;
        for role in &self.roles {
            role.role.parse::<PartyRole>()?;
            validate_country_code("Credentials", &role.country_code)?;
            validate_party_id("Credentials", &role.party_id)?;
        }
        Ok(())
    }

    /// Parties described by the roles, grouped per (country_code, party_id)
    pub fn parties(&self, platform_id: &str) -> DomainResult<Vec<Party>> {
        let mut parties: Vec<Party> = Vec::new();
        for role in &self.roles {
            let party_role = role.role.parse::<PartyRole>()?;
            match parties
                .iter_mut()
                .find(|p| p.matches(&role.country_code, &role.party_id))
            {
                Some(existing) => {
                    if !existing.roles.contains(&party_role) {
                        existing.roles.push(party_role);
                    }
                }
                None => {
                    let mut party = Party::new(
                        role.country_code.to_ascii_uppercase(),
                        role.party_id.to_ascii_uppercase(),
                        vec![party_role],
                        platform_id,
                    );
                    party.name = Some(role.business_details.name.clone());
                    parties.push(party);
                }
            }
        }
        Ok(parties)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDto {
    pub identifier: String,
    /// Absent in 2.1.1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<InterfaceRole>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDetails {
    pub version: String,
    pub endpoints: Vec<EndpointDto>,
}

impl VersionDetails {
    pub fn from_endpoints(version: &str, endpoints: &[Endpoint]) -> Self {
        Self {
            version: version.to_string(),
            endpoints: endpoints
                .iter()
                .map(|e| EndpointDto {
                    identifier: e.module.as_str().to_string(),
                    role: e.role,
                    url: e.url.clone(),
                })
                .collect(),
        }
    }

    /// Endpoints of modules this node knows; others are skipped.
    pub fn into_endpoints(self) -> Vec<Endpoint> {
        let version = self.version;
        self.endpoints
            .into_iter()
            .filter_map(|e| match e.identifier.parse::<ModuleId>() {
                Ok(module) => Some(Endpoint::new(module, e.role, version.clone(), e.url)),
                Err(_) => {
                    debug!(identifier = %e.identifier, "Skipping unsupported module endpoint");
                    None
                }
            })
            .collect()
    }
}
