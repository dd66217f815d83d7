//! Remote client registry: one configured client per connected platform
//!
//! Populated at startup from the CONNECTED platforms in storage and
//! refreshed by the credentials handshake on establish, update and delete.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::application::ports::{HttpMethod, OcpiRequest, RemoteResponse, SharedTransport};
use crate::domain::module::{InterfaceRole, ModuleId};
use crate::domain::platform::{Endpoint, Platform};
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainResult, TransportError};

/// Transport bound to one remote platform's token, version and endpoints
pub struct RemoteClient {
    platform_id: String,
    token: String,
    version: Option<String>,
    endpoints: Vec<Endpoint>,
    transport: SharedTransport,
}

impl RemoteClient {
    fn from_platform(platform: &Platform, transport: SharedTransport) -> Option<Self> {
        let token = platform.outbound_token()?.to_string();
        Some(Self {
            platform_id: platform.id.clone(),
            token,
            version: platform.current_version.clone(),
            endpoints: platform.endpoints.clone(),
            transport,
        })
    }

    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn endpoint_url(&self, module: ModuleId, role: InterfaceRole) -> Result<&str, TransportError> {
        self.endpoints
            .iter()
            .find(|e| e.module == module && e.role.map_or(true, |r| r == role))
            .map(|e| e.url.as_str())
            .ok_or_else(|| TransportError::NoEndpoint {
                platform_id: self.platform_id.clone(),
                module: format!("{} {}", module, role.as_str()),
            })
    }

    /// Request pre-filled with this platform's token and version
    pub fn request(&self, method: HttpMethod, url: impl Into<String>) -> OcpiRequest {
        OcpiRequest::new(method, url, self.token.clone()).version(self.version.as_deref())
    }

    /// Send and turn a non-success OCPI status into an error
    pub async fn send(&self, request: OcpiRequest) -> Result<RemoteResponse, TransportError> {
        self.transport.send(request).await?.into_result()
    }

    pub async fn call(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Value>,
    ) -> Result<RemoteResponse, TransportError> {
        let mut request = self.request(method, url);
        request.body = body;
        self.send(request).await
    }
}

/// Thread-safe registry of clients for connected remote platforms
pub struct PlatformClientRegistry {
    clients: DashMap<String, Arc<RemoteClient>>,
    transport: SharedTransport,
}

pub type SharedClientRegistry = Arc<PlatformClientRegistry>;

impl PlatformClientRegistry {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            clients: DashMap::new(),
            transport,
        }
    }

    pub fn shared(transport: SharedTransport) -> SharedClientRegistry {
        Arc::new(Self::new(transport))
    }

    /// Raw transport, for calls made before a platform is connected
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Register (or replace) the client for a connected platform.
    /// Platforms that are not connected are removed instead.
    pub fn register(&self, platform: &Platform) {
        if !platform.is_connected() {
            self.unregister(&platform.id);
            return;
        }
        match RemoteClient::from_platform(platform, self.transport.clone()) {
            Some(client) => {
                info!(
                    platform_id = %platform.id,
                    version = ?platform.current_version,
                    endpoints = platform.endpoints.len(),
                    "Registering remote platform client"
                );
                self.clients.insert(platform.id.clone(), Arc::new(client));
            }
            None => self.unregister(&platform.id),
        }
    }

    pub fn unregister(&self, platform_id: &str) {
        if self.clients.remove(platform_id).is_some() {
            info!(platform_id, "Unregistered remote platform client");
        }
    }

    pub fn get(&self, platform_id: &str) -> Option<Arc<RemoteClient>> {
        self.clients.get(platform_id).map(|c| c.value().clone())
    }

    /// Client for `platform`, registering it on first use
    pub fn client_for(&self, platform: &Platform) -> Result<Arc<RemoteClient>, TransportError> {
        if let Some(client) = self.get(&platform.id) {
            return Ok(client);
        }
        self.register(platform);
        self.get(&platform.id)
            .ok_or_else(|| TransportError::NoClient(platform.id.clone()))
    }

    pub fn is_registered(&self, platform_id: &str) -> bool {
        self.clients.contains_key(platform_id)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.clients.iter().map(|r| r.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Populate from every CONNECTED platform in storage
    pub async fn load_from(&self, repos: &dyn RepositoryProvider) -> DomainResult<usize> {
        let platforms = repos.platforms().find_connected().await?;
        for platform in &platforms {
            self.register(platform);
        }
        debug!(count = self.count(), "Remote platform clients loaded");
        Ok(self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::OcpiTransport;
    use async_trait::async_trait;

    struct NoopTransport;

    #[async_trait]
    impl OcpiTransport for NoopTransport {
        async fn send(&self, _request: OcpiRequest) -> Result<RemoteResponse, TransportError> {
            Ok(RemoteResponse::ok(Value::Null))
        }
    }

    fn connected(id: &str) -> Platform {
        let mut p = Platform::new_remote(id, id, vec!["2.2.1".into()]);
        p.mark_connected(
            "token-c".into(),
            "2.2.1".into(),
            vec![Endpoint::new(
                ModuleId::Locations,
                Some(InterfaceRole::Receiver),
                "2.2.1",
                "http://remote/ocpi/2.2.1/locations",
            )],
        )
        .unwrap();
        p
    }

    #[test]
    fn only_connected_platforms_are_registered() {
        let registry = PlatformClientRegistry::new(Arc::new(NoopTransport));
        registry.register(&connected("P1"));
        registry.register(&Platform::new_remote("P2", "P2", vec![]));
        assert!(registry.is_registered("P1"));
        assert!(!registry.is_registered("P2"));
        assert_eq!(registry.connected_ids(), vec!["P1".to_string()]);
    }

    #[test]
    fn disconnect_unregisters() {
        let registry = PlatformClientRegistry::new(Arc::new(NoopTransport));
        let mut p = connected("P1");
        registry.register(&p);
        p.disconnect();
        registry.register(&p);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn endpoint_lookup_by_role() {
        let registry = PlatformClientRegistry::new(Arc::new(NoopTransport));
        let client = registry.client_for(&connected("P1")).unwrap();
        assert!(client
            .endpoint_url(ModuleId::Locations, InterfaceRole::Receiver)
            .is_ok());
        let err = client
            .endpoint_url(ModuleId::Locations, InterfaceRole::Sender)
            .unwrap_err();
        assert!(matches!(err, TransportError::NoEndpoint { .. }));
        assert_eq!(client.request(HttpMethod::Get, "u").token, "token-c");
    }
}
