//! Credentials service: establishes, rotates, accepts and tears down
//! connections with remote platforms.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::dto::{BusinessDetails, Credentials, CredentialsRole, VersionDetails, VersionInfo};
use super::negotiation::{highest, select_version};
use crate::application::events::{
    Event, PlatformConnectedEvent, PlatformDisconnectedEvent, SharedEventBus,
};
use crate::application::ports::{HttpMethod, OcpiRequest};
use crate::application::registry::SharedClientRegistry;
use crate::domain::module::{InterfaceRole, ModuleId};
use crate::domain::platform::{Endpoint, LocalIdentity, Platform, PlatformStatus};
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainError, DomainResult, TransportError};
use crate::shared::token::generate_token;

/// Whether an inbound credentials call registers or updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// POST: first exchange, platform must not be connected yet
    Register,
    /// PUT: rotation on an already connected platform
    Update,
}

struct Negotiated {
    version: String,
    endpoints: Vec<Endpoint>,
}

pub struct CredentialsService {
    repos: Arc<dyn RepositoryProvider>,
    registry: SharedClientRegistry,
    identity: Arc<LocalIdentity>,
    event_bus: Option<SharedEventBus>,
}

impl CredentialsService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SharedClientRegistry,
        identity: Arc<LocalIdentity>,
    ) -> Self {
        Self {
            repos,
            registry,
            identity,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Record a counterpart that handed us a token A out of band.
    pub async fn register_platform(
        &self,
        id: &str,
        name: &str,
        token_a: &str,
        versions_url: &str,
    ) -> DomainResult<Platform> {
        if id.trim().is_empty() {
            return Err(DomainError::invalid("Platform", "id", "must not be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::invalid("Platform", "name", "must not be empty"));
        }
        if versions_url.trim().is_empty() {
            return Err(DomainError::invalid("Platform", "versions_url", "must not be empty"));
        }
        let mut platform = Platform::new_remote(id, name, self.identity.versions.clone());
        if !token_a.is_empty() {
            platform.token_a = Some(token_a.to_string());
        }
        platform.versions_url = Some(versions_url.to_string());
        self.repos.platforms().save(platform.clone()).await?;
        info!(platform_id = id, "Remote platform registered");
        Ok(platform)
    }

    /// Create a platform entry with a fresh token A for the counterpart to
    /// register with. Returns the platform; the token is `token_a`.
    pub async fn invite_platform(&self, id: &str, name: &str) -> DomainResult<Platform> {
        if id.trim().is_empty() {
            return Err(DomainError::invalid("Platform", "id", "must not be empty"));
        }
        let mut platform = Platform::new_remote(id, name, self.identity.versions.clone());
        platform.token_a = Some(generate_token());
        self.repos.platforms().save(platform.clone()).await?;
        info!(platform_id = id, "Invitation token issued");
        Ok(platform)
    }

    /// Outbound handshake: negotiate, POST our credentials, store theirs.
    #[instrument(skip(self))]
    pub async fn establish_connection(&self, platform_id: &str) -> DomainResult<Platform> {
        let platform = self.load(platform_id).await?;
        self.handshake(platform, HttpMethod::Post).await
    }

    /// Same negotiation on a CONNECTED platform with a fresh token B, PUT.
    #[instrument(skip(self))]
    pub async fn update_connection(&self, platform_id: &str) -> DomainResult<Platform> {
        let platform = self.load(platform_id).await?;
        if !platform.is_connected() {
            return Err(DomainError::Conflict(format!(
                "platform {} is not connected",
                platform_id
            )));
        }
        self.handshake(platform, HttpMethod::Put).await
    }

    async fn handshake(&self, mut platform: Platform, method: HttpMethod) -> DomainResult<Platform> {
        let token = platform
            .outbound_token()
            .map(str::to_string)
            .ok_or_else(|| DomainError::Validation("no tokens specified".into()))?;
        if platform.versions.is_empty() {
            return Err(DomainError::Validation("no versions specified".into()));
        }
        let versions_url = platform
            .versions_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DomainError::invalid("Platform", "versions_url", "must not be empty"))?;

        // The counterpart calls our versions endpoint with the new token B
        // before it answers, so the token must resolve while the request is
        // in flight. On rotation the outgoing token B stays accepted through
        // the token A slot until the exchange completes.
        let previous = (platform.status, platform.token_a.clone(), platform.token_b.clone());
        let token_b = generate_token();
        if method == HttpMethod::Post {
            platform.status = PlatformStatus::Registering;
        } else {
            platform.token_a = platform.token_b.take();
        }
        platform.token_b = Some(token_b.clone());
        self.repos.platforms().save(platform.clone()).await?;

        match self
            .exchange(&mut platform, &token, &token_b, &versions_url, method)
            .await
        {
            Ok(credentials) => {
                let parties = credentials.parties(&platform.id)?;
                self.repos.platforms().save(platform.clone()).await?;
                self.repos
                    .parties()
                    .replace_for_platform(&platform.id, parties)
                    .await?;
                self.registry.register(&platform);
                self.publish_connected(&platform, true);
                info!(
                    platform_id = %platform.id,
                    version = ?platform.current_version,
                    "Connection established"
                );
                Ok(platform)
            }
            Err(e) => {
                warn!(platform_id = %platform.id, error = %e, "Handshake failed");
                self.restore(&platform.id, previous).await;
                Err(e)
            }
        }
    }

    /// Put status and inbound tokens back after a failed handshake.
    async fn restore(
        &self,
        platform_id: &str,
        (status, token_a, token_b): (PlatformStatus, Option<String>, Option<String>),
    ) {
        match self.repos.platforms().find_by_id(platform_id).await {
            Ok(Some(mut stored)) => {
                stored.status = status;
                stored.token_a = token_a;
                stored.token_b = token_b;
                if let Err(e) = self.repos.platforms().save(stored).await {
                    warn!(platform_id, error = %e, "Failed to restore platform after handshake");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(platform_id, error = %e, "Failed to reload platform after handshake"),
        }
    }

    async fn exchange(
        &self,
        platform: &mut Platform,
        token: &str,
        token_b: &str,
        versions_url: &str,
        method: HttpMethod,
    ) -> DomainResult<Credentials> {
        let negotiated = self
            .negotiate(token, versions_url, &platform.versions)
            .await?;
        let credentials_url = negotiated
            .endpoints
            .iter()
            .find(|e| e.module == ModuleId::Credentials)
            .map(|e| e.url.clone())
            .ok_or_else(|| TransportError::NoEndpoint {
                platform_id: platform.id.clone(),
                module: ModuleId::Credentials.to_string(),
            })?;

        let ours = self.local_credentials(token_b);
        let body = serde_json::to_value(&ours)
            .map_err(|e| DomainError::Storage(format!("credentials serialization: {}", e)))?;
        let request = OcpiRequest::new(method, &credentials_url, token)
            .version(Some(&negotiated.version))
            .body(body);
        let response = self
            .registry
            .transport()
            .send(request)
            .await?
            .into_result()?;
        let theirs: Credentials = decode(&credentials_url, response.data)?;
        theirs.check()?;

        platform.token_a = None;
        platform.token_b = Some(token_b.to_string());
        platform.versions_url = Some(theirs.url.clone());
        platform.mark_connected(theirs.token.clone(), negotiated.version, negotiated.endpoints)?;
        Ok(theirs)
    }

    /// GET versions, pick one, GET its details.
    async fn negotiate(
        &self,
        token: &str,
        versions_url: &str,
        acceptable: &[String],
    ) -> DomainResult<Negotiated> {
        let local: Vec<String> = acceptable
            .iter()
            .filter(|v| self.identity.supports_version(v))
            .cloned()
            .collect();
        let hint = highest(&local);

        let response = self
            .registry
            .transport()
            .send(OcpiRequest::new(HttpMethod::Get, versions_url, token).version(hint))
            .await?
            .into_result()?;
        let versions: Vec<VersionInfo> = decode(versions_url, response.data)?;
        let remote: Vec<String> = versions.iter().map(|v| v.version.clone()).collect();
        let version = select_version(&local, &remote)?;
        let details_url = versions
            .iter()
            .find(|v| v.version == version)
            .map(|v| v.url.clone())
            .unwrap_or_default();

        let response = self
            .registry
            .transport()
            .send(OcpiRequest::new(HttpMethod::Get, &details_url, token).version(Some(&version)))
            .await?
            .into_result()?;
        let details: VersionDetails = decode(&details_url, response.data)?;
        let endpoints = details.into_endpoints();
        if endpoints.is_empty() {
            return Err(TransportError::Malformed {
                url: details_url,
                reason: "no endpoints advertised".into(),
            }
            .into());
        }
        Ok(Negotiated { version, endpoints })
    }

    /// Inbound half: the counterpart POSTs (or PUTs) its credentials.
    #[instrument(skip(self, presented_token, incoming), fields(url = %incoming.url))]
    pub async fn accept_connection(
        &self,
        platform_id: &str,
        presented_token: &str,
        incoming: Credentials,
        mode: HandshakeMode,
    ) -> DomainResult<Credentials> {
        incoming.check()?;
        let parties = incoming.parties(platform_id)?;

        let mut platform = self.load(platform_id).await?;
        if !platform.accepts_token(presented_token) {
            return Err(DomainError::Unauthorized("authentication failed".into()));
        }
        match (mode, platform.is_connected()) {
            (HandshakeMode::Register, true) => {
                return Err(DomainError::Conflict(format!(
                    "platform {} is already registered",
                    platform_id
                )))
            }
            (HandshakeMode::Update, false) => {
                return Err(DomainError::Conflict(format!(
                    "platform {} is not registered",
                    platform_id
                )))
            }
            _ => {}
        }

        let negotiated = self
            .negotiate(&incoming.token, &incoming.url, &platform.versions)
            .await?;
        let token_b = generate_token();
        platform.token_a = None;
        platform.token_b = Some(token_b.clone());
        platform.versions_url = Some(incoming.url.clone());
        platform.mark_connected(incoming.token.clone(), negotiated.version, negotiated.endpoints)?;

        self.repos.platforms().save(platform.clone()).await?;
        self.repos
            .parties()
            .replace_for_platform(platform_id, parties)
            .await?;
        self.registry.register(&platform);
        self.publish_connected(&platform, false);
        info!(platform_id, version = ?platform.current_version, "Connection accepted");

        Ok(self.local_credentials(&token_b))
    }

    /// GET credentials: what the caller should use to reach us.
    pub async fn on_remote_get_credentials(&self, platform_id: &str) -> DomainResult<Credentials> {
        let platform = self.load(platform_id).await?;
        let token = platform
            .token_b
            .clone()
            .or(platform.token_a.clone())
            .unwrap_or_default();
        Ok(self.local_credentials(&token))
    }

    /// DELETE credentials from the counterpart: tear the connection down.
    pub async fn on_remote_delete_credentials(&self, platform_id: &str) -> DomainResult<()> {
        let mut platform = self.load(platform_id).await?;
        if !platform.is_connected() {
            return Err(DomainError::Conflict(format!(
                "platform {} is not registered",
                platform_id
            )));
        }
        self.teardown(&mut platform, "unregistered by counterpart").await
    }

    /// Locally initiated unregistration: DELETE at the counterpart, then
    /// tear down regardless of the remote outcome.
    pub async fn delete_connection(&self, platform_id: &str) -> DomainResult<()> {
        let mut platform = self.load(platform_id).await?;
        if let Ok(client) = self.registry.client_for(&platform) {
            match client.endpoint_url(ModuleId::Credentials, InterfaceRole::Receiver) {
                Ok(url) => {
                    if let Err(e) = client.call(HttpMethod::Delete, url, None).await {
                        warn!(platform_id, error = %e, "Remote credentials delete failed");
                    }
                }
                Err(e) => warn!(platform_id, error = %e, "No credentials endpoint"),
            }
        }
        self.teardown(&mut platform, "unregistered locally").await
    }

    async fn teardown(&self, platform: &mut Platform, reason: &str) -> DomainResult<()> {
        platform.disconnect();
        self.repos.platforms().save(platform.clone()).await?;
        self.registry.unregister(&platform.id);
        if let Some(bus) = &self.event_bus {
            bus.publish(Event::PlatformDisconnected(PlatformDisconnectedEvent {
                platform_id: platform.id.clone(),
                reason: Some(reason.to_string()),
                timestamp: Utc::now(),
            }));
        }
        info!(platform_id = %platform.id, reason, "Connection torn down");
        Ok(())
    }

    /// Maintenance: remove a party record.
    pub async fn delete_party(&self, country_code: &str, party_id: &str) -> DomainResult<()> {
        if self
            .repos
            .parties()
            .find_by_external_id(country_code, party_id)
            .await?
            .is_none()
        {
            return Err(DomainError::not_found(
                "Party",
                "id",
                format!("{}*{}", country_code, party_id),
            ));
        }
        self.repos.parties().delete(country_code, party_id).await?;
        info!(country_code, party_id, "Party deleted");
        Ok(())
    }

    /// This node's credentials carrying `token`
    pub fn local_credentials(&self, token: &str) -> Credentials {
        let roles = self
            .identity
            .parties
            .iter()
            .flat_map(|party| {
                party.roles.iter().map(move |role| CredentialsRole {
                    role: role.as_str().to_string(),
                    business_details: BusinessDetails {
                        name: party.name.clone().unwrap_or_else(|| self.identity.name.clone()),
                        website: None,
                    },
                    party_id: party.party_id.clone(),
                    country_code: party.country_code.clone(),
                })
            })
            .collect();
        Credentials {
            token: token.to_string(),
            url: self.identity.versions_url(),
            roles,
        }
    }

    async fn load(&self, platform_id: &str) -> DomainResult<Platform> {
        self.repos
            .platforms()
            .find_by_id(platform_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Platform", "id", platform_id))
    }

    fn publish_connected(&self, platform: &Platform, initiated: bool) {
        if let Some(bus) = &self.event_bus {
            bus.publish(Event::PlatformConnected(PlatformConnectedEvent {
                platform_id: platform.id.clone(),
                version: platform.current_version.clone().unwrap_or_default(),
                initiated,
                timestamp: Utc::now(),
            }));
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, data: Value) -> Result<T, TransportError> {
    if data.is_null() {
        return Err(TransportError::EmptyResponse(url.to_string()));
    }
    serde_json::from_value(data).map_err(|e| TransportError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::PlatformClientRegistry;
    use crate::application::testing::{fixtures, RecordingTransport};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use serde_json::json;

    const REMOTE_VERSIONS: &str = "https://remote.example/ocpi/versions";
    const REMOTE_DETAILS: &str = "https://remote.example/ocpi/2.1.1";
    const REMOTE_CREDENTIALS: &str = "https://remote.example/ocpi/2.1.1/credentials";

    fn remote_side(transport: &RecordingTransport) {
        transport.respond(
            HttpMethod::Get,
            REMOTE_VERSIONS,
            json!([
                {"version": "2.0", "url": "https://remote.example/ocpi/2.0"},
                {"version": "2.1.1", "url": REMOTE_DETAILS}
            ]),
        );
        transport.respond(
            HttpMethod::Get,
            REMOTE_DETAILS,
            json!({
                "version": "2.1.1",
                "endpoints": [
                    {"identifier": "credentials", "url": REMOTE_CREDENTIALS},
                    {"identifier": "locations", "url": "https://remote.example/ocpi/2.1.1/locations"}
                ]
            }),
        );
        let creds = json!({
            "token": "token-c-from-remote",
            "url": REMOTE_VERSIONS,
            "roles": [{"role": "EMSP", "business_details": {"name": "Remote"}, "party_id": "REM", "country_code": "DE"}]
        });
        transport.respond(HttpMethod::Post, REMOTE_CREDENTIALS, creds.clone());
        transport.respond(HttpMethod::Put, REMOTE_CREDENTIALS, creds);
    }

    fn service(
        transport: Arc<RecordingTransport>,
    ) -> (CredentialsService, Arc<InMemoryRepositoryProvider>, SharedClientRegistry) {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let registry = PlatformClientRegistry::shared(transport);
        let mut identity = fixtures::identity();
        identity.versions = vec!["2.1.1".into(), "2.2".into()];
        let svc = CredentialsService::new(repos.clone(), registry.clone(), Arc::new(identity));
        (svc, repos, registry)
    }

    #[tokio::test]
    async fn establish_negotiates_and_connects() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        let (svc, repos, registry) = service(transport.clone());
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();

        let platform = svc.establish_connection("P1").await.unwrap();

        assert!(platform.is_connected());
        assert_eq!(platform.current_version.as_deref(), Some("2.1.1"));
        assert_eq!(platform.token_c.as_deref(), Some("token-c-from-remote"));
        assert!(platform.token_a.is_none());
        assert!(registry.is_registered("P1"));

        let posted = transport.requests_to(HttpMethod::Post, REMOTE_CREDENTIALS);
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].token, "token-a");
        let sent_token = posted[0].body.as_ref().unwrap()["token"].as_str().unwrap().to_string();
        assert_eq!(platform.token_b.as_deref(), Some(sent_token.as_str()));

        let parties = repos.parties().find_by_platform("P1").await.unwrap();
        assert_eq!(parties.len(), 1);
        assert_eq!(parties[0].party_id, "REM");
    }

    /// Counterpart that, like a real OCPI peer, resolves the token it was
    /// handed before answering the credentials call.
    struct CallbackCheckingPeer {
        inner: RecordingTransport,
        repos: Arc<InMemoryRepositoryProvider>,
        /// Token presented on the callback and the platform it resolved to
        resolved: std::sync::Mutex<Vec<(String, Option<String>)>>,
        old_token_b: std::sync::Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl crate::application::ports::OcpiTransport for CallbackCheckingPeer {
        async fn send(
            &self,
            request: OcpiRequest,
        ) -> Result<crate::application::ports::RemoteResponse, TransportError> {
            if request.url == REMOTE_CREDENTIALS {
                let mut presented: Vec<String> = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("token"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .into_iter()
                    .collect();
                presented.extend(self.old_token_b.lock().unwrap().clone());
                for token in presented {
                    let found = self.repos.platforms().find_by_token(&token).await.unwrap();
                    let platform_id = found.map(|p| p.id);
                    let unknown = platform_id.is_none();
                    self.resolved.lock().unwrap().push((token, platform_id));
                    if unknown {
                        return Err(TransportError::Remote {
                            status_code: 2000,
                            message: "versions callback was refused".into(),
                        });
                    }
                }
            }
            self.inner.send(request).await
        }
    }

    fn callback_checking_service() -> (CredentialsService, Arc<InMemoryRepositoryProvider>, Arc<CallbackCheckingPeer>) {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let peer = Arc::new(CallbackCheckingPeer {
            inner: RecordingTransport::new(),
            repos: repos.clone(),
            resolved: std::sync::Mutex::new(Vec::new()),
            old_token_b: std::sync::Mutex::new(None),
        });
        remote_side(&peer.inner);
        let mut identity = fixtures::identity();
        identity.versions = vec!["2.1.1".into()];
        let svc = CredentialsService::new(
            repos.clone(),
            PlatformClientRegistry::shared(peer.clone()),
            Arc::new(identity),
        );
        (svc, repos, peer)
    }

    #[tokio::test]
    async fn token_b_resolves_while_credentials_post_is_in_flight() {
        let (svc, _, peer) = callback_checking_service();
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();

        let platform = svc.establish_connection("P1").await.unwrap();

        let resolved = peer.resolved.lock().unwrap().clone();
        assert_eq!(resolved.len(), 1);
        assert_eq!(Some(resolved[0].0.clone()), platform.token_b);
        assert_eq!(resolved[0].1.as_deref(), Some("P1"));
        assert!(platform.is_connected());
        assert!(!platform.accepts_token("token-a"));
    }

    #[tokio::test]
    async fn rotation_keeps_both_token_b_usable_until_put_completes() {
        let (svc, repos, peer) = callback_checking_service();
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();
        let first = svc.establish_connection("P1").await.unwrap();
        let old = first.token_b.clone().unwrap();
        *peer.old_token_b.lock().unwrap() = Some(old.clone());

        let updated = svc.update_connection("P1").await.unwrap();

        let resolved = peer.resolved.lock().unwrap().clone();
        assert!(resolved.iter().all(|(_, id)| id.as_deref() == Some("P1")));
        assert!(resolved.iter().any(|(t, _)| *t == old));
        let stored = repos.platforms().find_by_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.token_b, updated.token_b);
        assert!(!stored.accepts_token(&old));
        assert_eq!(stored.token_a, None);
    }

    #[tokio::test]
    async fn failed_post_restores_tokens_and_status() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        transport.fail(
            HttpMethod::Post,
            REMOTE_CREDENTIALS,
            TransportError::HttpStatus {
                url: REMOTE_CREDENTIALS.into(),
                status: 500,
            },
        );
        let (svc, repos, registry) = service(transport.clone());
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();

        assert!(svc.establish_connection("P1").await.is_err());

        let stored = repos.platforms().find_by_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.status, PlatformStatus::New);
        assert_eq!(stored.token_b, None);
        assert_eq!(stored.token_a.as_deref(), Some("token-a"));
        assert!(!registry.is_registered("P1"));
    }

    #[tokio::test]
    async fn establish_without_tokens_makes_no_call() {
        let transport = Arc::new(RecordingTransport::new());
        let (svc, repos, _) = service(transport.clone());
        let mut p3 = Platform::new_remote("P3", "No tokens", vec!["2.2".into()]);
        p3.versions_url = Some(REMOTE_VERSIONS.into());
        repos.platforms().save(p3).await.unwrap();

        let err = svc.establish_connection("P3").await.unwrap_err();

        assert!(err.to_string().contains("no tokens specified"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn establish_without_versions_fails_fast() {
        let transport = Arc::new(RecordingTransport::new());
        let (svc, repos, _) = service(transport.clone());
        let mut p = Platform::new_remote("P4", "No versions", vec![]);
        p.token_a = Some("a".into());
        repos.platforms().save(p).await.unwrap();

        let err = svc.establish_connection("P4").await.unwrap_err();
        assert!(err.to_string().contains("no versions specified"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn incompatible_versions_leave_platform_unconnected() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(
            HttpMethod::Get,
            REMOTE_VERSIONS,
            json!([{"version": "2.0", "url": "https://remote.example/ocpi/2.0"}]),
        );
        let (svc, repos, _) = service(transport.clone());
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();

        let err = svc.establish_connection("P1").await.unwrap_err();

        assert!(err.to_string().contains("no compatible version"));
        let stored = repos.platforms().find_by_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.status, PlatformStatus::New);
        assert_eq!(transport.requests_to(HttpMethod::Post, REMOTE_CREDENTIALS).len(), 0);
    }

    #[tokio::test]
    async fn update_rotates_token_b_with_put() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        let (svc, _, _) = service(transport.clone());
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();
        let first = svc.establish_connection("P1").await.unwrap();

        let updated = svc.update_connection("P1").await.unwrap();

        assert_ne!(first.token_b, updated.token_b);
        let put = transport.requests_to(HttpMethod::Put, REMOTE_CREDENTIALS);
        assert_eq!(put.len(), 1);
        assert_eq!(put[0].token, "token-c-from-remote");
    }

    #[tokio::test]
    async fn update_requires_connection() {
        let transport = Arc::new(RecordingTransport::new());
        let (svc, _, _) = service(transport);
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();
        let err = svc.update_connection("P1").await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn accept_rejects_unknown_token() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        let (svc, _, _) = service(transport.clone());
        let invited = svc.invite_platform("P1", "Remote").await.unwrap();
        assert!(invited.token_a.is_some());

        let incoming: Credentials = serde_json::from_value(json!({
            "token": "their-token",
            "url": REMOTE_VERSIONS,
            "roles": [{"role": "EMSP", "business_details": {"name": "Remote"}, "party_id": "REM", "country_code": "DE"}]
        }))
        .unwrap();
        let err = svc
            .accept_connection("P1", "wrong", incoming, HandshakeMode::Register)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn accept_completes_mutual_handshake_and_delete_tears_down() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        let (svc, repos, registry) = service(transport.clone());
        let invited = svc.invite_platform("P1", "Remote").await.unwrap();
        let token_a = invited.token_a.clone().unwrap();

        let incoming: Credentials = serde_json::from_value(json!({
            "token": "their-token",
            "url": REMOTE_VERSIONS,
            "roles": [{"role": "EMSP", "business_details": {"name": "Remote"}, "party_id": "REM", "country_code": "DE"}]
        }))
        .unwrap();
        let ours = svc
            .accept_connection("P1", &token_a, incoming, HandshakeMode::Register)
            .await
            .unwrap();

        let stored = repos.platforms().find_by_id("P1").await.unwrap().unwrap();
        assert!(stored.is_connected());
        assert_eq!(stored.token_b.as_deref(), Some(ours.token.as_str()));
        assert_eq!(stored.token_c.as_deref(), Some("their-token"));
        assert!(!stored.accepts_token(&token_a));
        assert!(registry.is_registered("P1"));

        svc.on_remote_delete_credentials("P1").await.unwrap();
        let stored = repos.platforms().find_by_id("P1").await.unwrap().unwrap();
        assert_eq!(stored.status, PlatformStatus::New);
        assert!(!stored.accepts_token(&ours.token));
        assert!(!registry.is_registered("P1"));
    }

    #[tokio::test]
    async fn credentials_update_refuses_our_own_token_c() {
        let transport = Arc::new(RecordingTransport::new());
        remote_side(&transport);
        let (svc, _, _) = service(transport.clone());
        svc.register_platform("P1", "Remote", "token-a", REMOTE_VERSIONS)
            .await
            .unwrap();
        let connected = svc.establish_connection("P1").await.unwrap();
        let token_c = connected.token_c.clone().unwrap();

        let incoming: Credentials = serde_json::from_value(json!({
            "token": "rotated-token",
            "url": REMOTE_VERSIONS,
            "roles": [{"role": "EMSP", "business_details": {"name": "Remote"}, "party_id": "REM", "country_code": "DE"}]
        }))
        .unwrap();
        let err = svc
            .accept_connection("P1", &token_c, incoming, HandshakeMode::Update)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn delete_unknown_party_is_not_found() {
        let (svc, _, _) = service(Arc::new(RecordingTransport::new()));
        let err = svc.delete_party("NL", "XXX").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Party", .. }));
    }
}
