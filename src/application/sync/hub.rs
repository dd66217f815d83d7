//! One synchronizer per module, built from shared collaborators

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;

use super::synchronizer::{ModuleSynchronizer, SyncReport};
use crate::application::dispatch::ErrorHandler;
use crate::application::registry::SharedClientRegistry;
use crate::domain::{
    Cdr, ClientInfo, LocalIdentity, Location, RepositoryProvider, Session, SyncEntity, Tariff,
    Token,
};

#[derive(Clone)]
pub struct Synchronizers {
    pub locations: ModuleSynchronizer<Location>,
    pub sessions: ModuleSynchronizer<Session>,
    pub tariffs: ModuleSynchronizer<Tariff>,
    pub tokens: ModuleSynchronizer<Token>,
    pub cdrs: ModuleSynchronizer<Cdr>,
    pub client_info: ModuleSynchronizer<ClientInfo>,
}

impl Synchronizers {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SharedClientRegistry,
        identity: Arc<LocalIdentity>,
        on_error: ErrorHandler,
        page_limit: u64,
    ) -> Self {
        Self {
            locations: ModuleSynchronizer::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                page_limit,
            ),
            sessions: ModuleSynchronizer::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                page_limit,
            ),
            tariffs: ModuleSynchronizer::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                page_limit,
            ),
            tokens: ModuleSynchronizer::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                page_limit,
            ),
            cdrs: ModuleSynchronizer::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                page_limit,
            ),
            client_info: ModuleSynchronizer::new(repos, registry, identity, on_error, page_limit),
        }
    }

    /// General reconciliation sweep over every module.
    pub async fn pull_all(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        collect(&mut reports, self.locations.pull(from, to).await);
        collect(&mut reports, self.sessions.pull(from, to).await);
        collect(&mut reports, self.tariffs.pull(from, to).await);
        collect(&mut reports, self.tokens.pull(from, to).await);
        collect(&mut reports, self.cdrs.pull(from, to).await);
        collect(&mut reports, self.client_info.pull(from, to).await);
        reports
    }

    /// Sweep for platforms that cannot push, over every module.
    pub async fn pull_all_push_unsupported(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        collect(&mut reports, self.locations.pull_when_push_not_supported(from, to).await);
        collect(&mut reports, self.sessions.pull_when_push_not_supported(from, to).await);
        collect(&mut reports, self.tariffs.pull_when_push_not_supported(from, to).await);
        collect(&mut reports, self.tokens.pull_when_push_not_supported(from, to).await);
        collect(&mut reports, self.cdrs.pull_when_push_not_supported(from, to).await);
        collect(&mut reports, self.client_info.pull_when_push_not_supported(from, to).await);
        reports
    }

    pub fn get<T: SyncEntity>(&self) -> &ModuleSynchronizer<T>
    where
        Self: SynchronizerFor<T>,
    {
        self.synchronizer()
    }
}

fn collect(reports: &mut Vec<SyncReport>, result: crate::shared::errors::DomainResult<SyncReport>) {
    match result {
        Ok(report) => reports.push(report),
        Err(e) => error!(error = %e, "Pull sweep failed"),
    }
}

/// Typed access to the synchronizer of module `T`, for generic handlers
pub trait SynchronizerFor<T: SyncEntity> {
    fn synchronizer(&self) -> &ModuleSynchronizer<T>;
}

macro_rules! synchronizer_for {
    ($entity:ty, $field:ident) => {
        impl SynchronizerFor<$entity> for Synchronizers {
            fn synchronizer(&self) -> &ModuleSynchronizer<$entity> {
                &self.$field
            }
        }
    };
}

synchronizer_for!(Location, locations);
synchronizer_for!(Session, sessions);
synchronizer_for!(Tariff, tariffs);
synchronizer_for!(Token, tokens);
synchronizer_for!(Cdr, cdrs);
synchronizer_for!(ClientInfo, client_info);
