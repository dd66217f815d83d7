//! Platform and party repository interfaces

use async_trait::async_trait;

use super::model::{Party, Platform};
use crate::shared::errors::DomainResult;

#[async_trait]
pub trait PlatformRepository: Send + Sync {
    /// Insert or fully replace a platform record
    async fn save(&self, platform: Platform) -> DomainResult<()>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Platform>>;

    /// Resolve a platform from a token it presented (token A or B)
    async fn find_by_token(&self, token: &str) -> DomainResult<Option<Platform>>;

    /// All CONNECTED remote platforms
    async fn find_connected(&self) -> DomainResult<Vec<Platform>>;

    async fn find_all(&self) -> DomainResult<Vec<Platform>>;

    async fn delete(&self, id: &str) -> DomainResult<()>;
}

#[async_trait]
pub trait PartyRepository: Send + Sync {
    /// Replace every party of `platform_id` with `parties`
    async fn replace_for_platform(&self, platform_id: &str, parties: Vec<Party>)
        -> DomainResult<()>;

    async fn find_by_platform(&self, platform_id: &str) -> DomainResult<Vec<Party>>;

    /// Look a party up by its external id (country_code + party_id)
    async fn find_by_external_id(
        &self,
        country_code: &str,
        party_id: &str,
    ) -> DomainResult<Option<Party>>;

    /// Maintenance-only removal
    async fn delete(&self, country_code: &str, party_id: &str) -> DomainResult<()>;
}
