//! Command repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Command, CommandDirection, CommandStatus};
use crate::shared::errors::DomainResult;

#[async_trait]
pub trait CommandRepository: Send + Sync {
    /// Persist a new command (fails on duplicate uid)
    async fn save(&self, command: Command) -> DomainResult<()>;

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<Command>>;

    /// Compare-and-set PENDING -> `status`.
    ///
    /// Returns `true` only for the single caller whose write moved the row
    /// out of PENDING; every later attempt returns `false` and writes nothing.
    async fn finalize(
        &self,
        uid: &str,
        status: CommandStatus,
        message: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// PENDING commands of `direction` whose deadline is at or before `now`
    async fn find_overdue(
        &self,
        direction: CommandDirection,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Command>>;
}
