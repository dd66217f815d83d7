use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::module::ModuleId;
use crate::domain::sync::SyncEntity;
use crate::shared::errors::DomainResult;
use crate::shared::validations::{validate_id, validate_max_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    AdHocUser,
    AppUser,
    Other,
    Rfid,
}

/// Authorisation token, identified by `uid` within its issuing party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub country_code: String,
    pub party_id: String,
    pub uid: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_number: Option<String>,
    pub issuer: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncEntity for Token {
    const MODULE: ModuleId = ModuleId::Tokens;
    const NAME: &'static str = "Token";

    fn id(&self) -> &str {
        &self.uid
    }

    fn country_code(&self) -> &str {
        &self.country_code
    }

    fn party_id(&self) -> &str {
        &self.party_id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn validate_payload(&self) -> DomainResult<()> {
        validate_id("Token", "contract_id", &self.contract_id)?;
        validate_max_len("Token", "issuer", &self.issuer, 64)?;
        if let Some(visual) = &self.visual_number {
            validate_max_len("Token", "visual_number", visual, 64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uid_is_the_identity() {
        let token = Token::from_wire(json!({
            "country_code": "DE",
            "party_id": "EMS",
            "uid": "04A1B2C3",
            "type": "RFID",
            "contract_id": "DE-EMS-C00001",
            "issuer": "Example eMSP",
            "valid": true,
            "whitelist": "ALLOWED",
            "last_updated": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(token.id(), "04A1B2C3");
        assert_eq!(token.token_type, TokenType::Rfid);
        assert!(token.validate().is_ok());
    }

    #[test]
    fn unknown_token_type_fails_decoding() {
        let err = Token::from_wire(json!({
            "country_code": "DE",
            "party_id": "EMS",
            "uid": "X",
            "type": "CREDIT_CARD",
            "contract_id": "C",
            "issuer": "I",
            "valid": true,
            "last_updated": "2024-03-01T10:00:00Z"
        }))
        .unwrap_err();
        assert!(err.to_string().starts_with("Validation: Token"));
    }
}
