//! Generic module synchronizer
//!
//! One algorithm for every synchronized module: push local changes to
//! connected receivers, merge remote pushes, and pull from remote senders
//! as the reconciliation sweep. Only entity storage is written here.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::page_reader::PageReader;
use crate::application::dispatch::{DispatchFailure, Dispatched, ErrorHandler};
use crate::application::ports::HttpMethod;
use crate::application::registry::SharedClientRegistry;
use crate::domain::module::InterfaceRole;
use crate::domain::platform::{LocalIdentity, Platform};
use crate::domain::sync::{EntityKey, MergeOutcome, SyncEntity};
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainError, DomainResult};
use crate::shared::pagination::{PageRequest, PaginatedResult};

/// Outcome of one pull sweep over every selected platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub module: &'static str,
    pub platforms: usize,
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Entities failing validation, ownership or storage
    pub rejected: u64,
    /// `(platform_id, error)` for platforms whose pull stopped early
    pub failed_platforms: Vec<(String, String)>,
}

impl SyncReport {
    fn new(module: &'static str) -> Self {
        Self {
            module,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Which connected platforms a pull sweep visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullScope {
    All,
    PushUnsupported,
}

pub struct ModuleSynchronizer<T: SyncEntity> {
    pub(super) repos: Arc<dyn RepositoryProvider>,
    registry: SharedClientRegistry,
    pub(super) identity: Arc<LocalIdentity>,
    on_error: ErrorHandler,
    page_limit: u64,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SyncEntity> Clone for ModuleSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            repos: self.repos.clone(),
            registry: self.registry.clone(),
            identity: self.identity.clone(),
            on_error: self.on_error.clone(),
            page_limit: self.page_limit,
            _entity: PhantomData,
        }
    }
}

impl<T: SyncEntity> ModuleSynchronizer<T> {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SharedClientRegistry,
        identity: Arc<LocalIdentity>,
        on_error: ErrorHandler,
        page_limit: u64,
    ) -> Self {
        Self {
            repos,
            registry,
            identity,
            on_error,
            page_limit: page_limit.clamp(1, 1000),
            _entity: PhantomData,
        }
    }

    // ── Outbound push ──────────────────────────────────────────

    /// Local entity changed: store it and push it to every connected receiver.
    pub async fn on_local_changed(&self, entity: &T) -> DomainResult<Dispatched> {
        self.on_local_changed_with(entity, self.on_error.clone()).await
    }

    /// As [`on_local_changed`](Self::on_local_changed) with a caller-supplied error handler.
    pub async fn on_local_changed_with(
        &self,
        entity: &T,
        on_error: ErrorHandler,
    ) -> DomainResult<Dispatched> {
        self.store_local(entity).await?;

        let body = entity.to_wire()?;
        let method = if T::PUSH_BY_POST {
            HttpMethod::Post
        } else {
            HttpMethod::Put
        };
        let suffix = (!T::PUSH_BY_POST).then(|| object_path(&entity.key()));
        self.push(&entity.key(), method, suffix, body, on_error).await
    }

    /// Local entity partially changed: merge `patch` locally, PATCH receivers.
    pub async fn on_local_patched(
        &self,
        country_code: &str,
        party_id: &str,
        id: &str,
        patch: Value,
    ) -> DomainResult<Dispatched> {
        let key = EntityKey::new(T::MODULE, country_code, party_id, id);
        self.ensure_local(country_code, party_id, &key)?;
        let current = self.load(&key).await?;
        let patched = current.patched(&patch)?;
        self.store_local(&patched).await?;
        self.push(&key, HttpMethod::Patch, Some(object_path(&key)), patch, self.on_error.clone())
            .await
    }

    pub(super) fn error_handler(&self) -> ErrorHandler {
        self.on_error.clone()
    }

    /// Validate and store a local entity under the local platform id.
    pub(super) async fn store_local(&self, entity: &T) -> DomainResult<MergeOutcome> {
        entity.validate()?;
        self.ensure_local(entity.country_code(), entity.party_id(), &entity.key())?;
        self.repos
            .entities()
            .upsert_if_newer(entity.to_stored(&self.identity.platform_id)?)
            .await
    }

    pub(super) async fn push(
        &self,
        key: &EntityKey,
        method: HttpMethod,
        suffix: Option<String>,
        body: Value,
        on_error: ErrorHandler,
    ) -> DomainResult<Dispatched> {
        let mut dispatched = Dispatched::new();
        for platform in self.repos.platforms().find_connected().await? {
            let client = match self.registry.client_for(&platform) {
                Ok(client) => client,
                Err(e) => {
                    on_error(DispatchFailure {
                        platform_id: platform.id.clone(),
                        module: T::MODULE,
                        entity_id: key.id.clone(),
                        error: e.into(),
                    });
                    continue;
                }
            };
            let Ok(base) = client.endpoint_url(T::MODULE, InterfaceRole::Receiver) else {
                debug!(platform_id = %platform.id, module = %T::MODULE, "No receiver endpoint, skipping push");
                continue;
            };
            let url = match &suffix {
                Some(path) => format!("{}/{}", base.trim_end_matches('/'), path),
                None => base.to_string(),
            };
            let request = client.request(method, url).body(body.clone());
            let module = T::MODULE.as_str();
            dispatched.spawn(&platform.id, T::MODULE, &key.id, on_error.clone(), async move {
                match client.send(request).await {
                    Ok(_) => {
                        counter!("ocpi_push_total", "module" => module, "outcome" => "ok").increment(1);
                        Ok(())
                    }
                    Err(e) => {
                        counter!("ocpi_push_total", "module" => module, "outcome" => "error").increment(1);
                        Err(e.into())
                    }
                }
            });
        }
        debug!(key = %key, targets = dispatched.len(), "Push dispatched");
        Ok(dispatched)
    }

    // ── Inbound push ───────────────────────────────────────────

    /// Counterpart PUT a full object.
    pub async fn on_remote_put(&self, platform_id: &str, entity: T) -> DomainResult<MergeOutcome> {
        entity.validate()?;
        self.ensure_remote(platform_id, entity.country_code(), entity.party_id(), &entity.key())
            .await?;
        self.merge(platform_id, &entity).await
    }

    /// Counterpart PATCHed some fields of an object.
    pub async fn on_remote_patch(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        id: &str,
        patch: Value,
    ) -> DomainResult<MergeOutcome> {
        let key = EntityKey::new(T::MODULE, country_code, party_id, id);
        self.ensure_remote(platform_id, country_code, party_id, &key).await?;
        if patch.get("last_updated").is_none() {
            return Err(DomainError::invalid(T::NAME, "last_updated", "required in PATCH"));
        }
        let current = self.load(&key).await?;
        let patched = current.patched(&patch)?;
        patched.validate()?;
        self.merge(platform_id, &patched).await
    }

    /// Counterpart reads back an object it owns.
    pub async fn on_remote_get(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        id: &str,
    ) -> DomainResult<T> {
        let key = EntityKey::new(T::MODULE, country_code, party_id, id);
        self.ensure_remote(platform_id, country_code, party_id, &key).await?;
        self.load(&key).await
    }

    /// Local objects for the sender interface, updated within `[from, to)`.
    pub async fn list_local(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<Value>> {
        let result = self
            .repos
            .entities()
            .find_updated(T::MODULE, &self.identity.platform_id, from, to, page)
            .await?;
        Ok(result.map(|stored| stored.payload))
    }

    /// Guarded last-writer-wins write.
    pub async fn merge(&self, platform_id: &str, entity: &T) -> DomainResult<MergeOutcome> {
        let outcome = self
            .repos
            .entities()
            .upsert_if_newer(entity.to_stored(platform_id)?)
            .await?;
        debug!(
            platform_id,
            key = %entity.key(),
            last_updated = %entity.last_updated(),
            outcome = outcome.as_str(),
            "Merged remote entity"
        );
        Ok(outcome)
    }

    // ── Scheduled pull ─────────────────────────────────────────

    /// Reconciliation sweep over every connected platform.
    pub async fn pull(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<SyncReport> {
        self.pull_scoped(PullScope::All, from, to).await
    }

    /// Sweep restricted to platforms that cannot push this module.
    pub async fn pull_when_push_not_supported(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<SyncReport> {
        self.pull_scoped(PullScope::PushUnsupported, from, to).await
    }

    async fn pull_scoped(
        &self,
        scope: PullScope,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<SyncReport> {
        let mut report = SyncReport::new(T::MODULE.as_str());
        let platforms = self.repos.platforms().find_connected().await?;
        for platform in platforms {
            if scope == PullScope::PushUnsupported && platform.supports_push(T::MODULE) {
                continue;
            }
            if platform.endpoint(T::MODULE, InterfaceRole::Sender).is_none() {
                continue;
            }
            report.platforms += 1;
            if let Err(e) = self.pull_platform(&platform, from, to, &mut report).await {
                warn!(platform_id = %platform.id, module = %T::MODULE, error = %e, "Pull stopped");
                report.failed_platforms.push((platform.id.clone(), e.to_string()));
            }
        }
        counter!("ocpi_pull_entities_total", "module" => T::MODULE.as_str()).increment(report.fetched);
        if report.fetched > 0 || !report.failed_platforms.is_empty() {
            info!(
                module = report.module,
                platforms = report.platforms,
                fetched = report.fetched,
                created = report.created,
                updated = report.updated,
                rejected = report.rejected,
                failed = report.failed_platforms.len(),
                "Pull finished"
            );
        }
        Ok(report)
    }

    async fn pull_platform(
        &self,
        platform: &Platform,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        report: &mut SyncReport,
    ) -> DomainResult<()> {
        let client = self.registry.client_for(platform)?;
        let url = client.endpoint_url(T::MODULE, InterfaceRole::Sender)?.to_string();
        let mut reader = PageReader::new(client, url, from, to, self.page_limit);
        while let Some(page) = reader.next_page().await? {
            for value in page.items {
                report.fetched += 1;
                match self.merge_pulled(&platform.id, value).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        report.rejected += 1;
                        warn!(platform_id = %platform.id, module = %T::MODULE, error = %e, "Pulled entity rejected");
                    }
                }
            }
        }
        Ok(())
    }

    async fn merge_pulled(&self, platform_id: &str, value: Value) -> DomainResult<MergeOutcome> {
        let entity = T::from_wire(value)?;
        self.on_remote_put(platform_id, entity).await
    }

    // ── Ownership ──────────────────────────────────────────────

    pub(super) fn ensure_local(&self, country_code: &str, party_id: &str, key: &EntityKey) -> DomainResult<()> {
        if self.identity.owns_party(country_code, party_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "{} {} does not belong to local platform",
                T::NAME,
                key
            )))
        }
    }

    pub(super) async fn ensure_remote(
        &self,
        platform_id: &str,
        country_code: &str,
        party_id: &str,
        key: &EntityKey,
    ) -> DomainResult<()> {
        let party = self
            .repos
            .parties()
            .find_by_external_id(country_code, party_id)
            .await?;
        match party {
            Some(p) if p.platform_id == platform_id => Ok(()),
            _ => Err(DomainError::Forbidden(format!(
                "{} {} does not belong to remote platform {}",
                T::NAME,
                key,
                platform_id
            ))),
        }
    }

    pub(super) async fn load(&self, key: &EntityKey) -> DomainResult<T> {
        let stored = self
            .repos
            .entities()
            .find(key)
            .await?
            .ok_or_else(|| DomainError::not_found(T::NAME, "id", key.id.clone()))?;
        T::from_stored(stored)
    }
}

/// `{country_code}/{party_id}/{id}` suffix of an object URL
pub(super) fn object_path(key: &EntityKey) -> String {
    format!("{}/{}/{}", key.country_code, key.party_id, key.id)
}
