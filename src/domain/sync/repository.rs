//! Entity repository interface shared by all synchronized modules

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{EntityKey, MergeOutcome, StoredEntity};
use crate::domain::module::ModuleId;
use crate::shared::errors::DomainResult;
use crate::shared::pagination::{PageRequest, PaginatedResult};

/// Computes the replacement for a stored row (`None` when absent).
/// Returning `None` leaves the row untouched.
pub type EntityUpdate<'a> =
    &'a (dyn Fn(Option<StoredEntity>) -> DomainResult<Option<StoredEntity>> + Send + Sync);

#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn find(&self, key: &EntityKey) -> DomainResult<Option<StoredEntity>>;

    /// Last-writer-wins write: stores `record` only if no row exists or the
    /// stored `last_updated` is strictly older.
    async fn upsert_if_newer(&self, record: StoredEntity) -> DomainResult<MergeOutcome>;

    /// Atomic read-modify-write of one row. No other write to the row can
    /// land between the read handed to `apply` and the write of its result.
    async fn modify(&self, key: &EntityKey, apply: EntityUpdate<'_>) -> DomainResult<MergeOutcome>;

    /// Entities of `module` originating from `platform_id`, updated within
    /// `[from, to)`, ordered by `last_updated`.
    async fn find_updated(
        &self,
        module: ModuleId,
        platform_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<StoredEntity>>;

    async fn delete(&self, key: &EntityKey) -> DomainResult<()>;
}
