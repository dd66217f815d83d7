use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::merge::merge_patch;
use crate::domain::module::ModuleId;
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::validations::{
    validate_country_code, validate_id, validate_party_id, validate_timestamp,
};

/// Identity of a synchronized entity: unique within its owning party
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub module: ModuleId,
    pub country_code: String,
    pub party_id: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(
        module: ModuleId,
        country_code: &str,
        party_id: &str,
        id: impl Into<String>,
    ) -> Self {
        Self {
            module,
            country_code: country_code.to_ascii_uppercase(),
            party_id: party_id.to_ascii_uppercase(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.module, self.country_code, self.party_id, self.id)
    }
}

/// Storage row for any synchronized module
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub key: EntityKey,
    /// Platform the record originated from
    pub platform_id: String,
    pub last_updated: DateTime<Utc>,
    pub payload: Value,
}

/// What a guarded write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
    /// Incoming record was not strictly newer; nothing written.
    Unchanged,
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Capabilities the synchronizer needs from a module type.
pub trait SyncEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const MODULE: ModuleId;
    /// Entity name used in errors.
    const NAME: &'static str;
    /// Child collections merged element-wise on PATCH, as `(field, key field)`.
    const KEYED_COLLECTIONS: &'static [(&'static str, &'static str)] = &[];
    /// CDRs are created with POST on the collection; everything else is PUT by id.
    const PUSH_BY_POST: bool = false;

    fn id(&self) -> &str;
    fn country_code(&self) -> &str;
    fn party_id(&self) -> &str;
    fn last_updated(&self) -> DateTime<Utc>;

    /// Module-specific structural checks.
    fn validate_payload(&self) -> DomainResult<()> {
        Ok(())
    }

    fn key(&self) -> EntityKey {
        EntityKey::new(Self::MODULE, self.country_code(), self.party_id(), self.id())
    }

    fn validate(&self) -> DomainResult<()> {
        validate_id(Self::NAME, "id", self.id())?;
        validate_country_code(Self::NAME, self.country_code())?;
        validate_party_id(Self::NAME, self.party_id())?;
        validate_timestamp(Self::NAME, "last_updated", self.last_updated())?;
        self.validate_payload()
    }

    fn to_wire(&self) -> DomainResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| DomainError::Storage(format!("{} serialization: {}", Self::NAME, e)))
    }

    fn from_wire(value: Value) -> DomainResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| DomainError::Validation(format!("{}: {}", Self::NAME, e)))
    }

    fn to_stored(&self, platform_id: &str) -> DomainResult<StoredEntity> {
        Ok(StoredEntity {
            key: self.key(),
            platform_id: platform_id.to_string(),
            last_updated: self.last_updated(),
            payload: self.to_wire()?,
        })
    }

    fn from_stored(stored: StoredEntity) -> DomainResult<Self> {
        serde_json::from_value(stored.payload)
            .map_err(|e| DomainError::Storage(format!("{} {}: {}", Self::NAME, stored.key, e)))
    }

    /// Apply a partial update, leaving absent fields untouched.
    fn patched(&self, patch: &Value) -> DomainResult<Self> {
        if !patch.is_object() {
            return Err(DomainError::Validation(format!(
                "{} patch must be a JSON object",
                Self::NAME
            )));
        }
        let mut wire = self.to_wire()?;
        merge_patch(&mut wire, patch, Self::KEYED_COLLECTIONS);
        let patched = Self::from_wire(wire)?;
        if patched.key() != self.key() {
            return Err(DomainError::Validation(format!(
                "{} patch must not change the identifying attributes",
                Self::NAME
            )));
        }
        Ok(patched)
    }
}
