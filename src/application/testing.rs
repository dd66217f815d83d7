//! Test doubles shared by application tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{HttpMethod, OcpiRequest, OcpiTransport, RemoteResponse};
use crate::shared::errors::TransportError;

/// Transport answering from a route table and recording every request.
/// Unrouted requests fail with `SendFailed`.
#[derive(Default)]
pub struct RecordingTransport {
    routes: Mutex<HashMap<(HttpMethod, String), Result<RemoteResponse, TransportError>>>,
    requests: Mutex<Vec<OcpiRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: HttpMethod, url: &str, data: Value) {
        self.route(method, url, Ok(RemoteResponse::ok(data)));
    }

    pub fn respond_page(
        &self,
        method: HttpMethod,
        url: &str,
        data: Value,
        total: u64,
        limit: u64,
        next_link: Option<&str>,
    ) {
        let mut response = RemoteResponse::ok(data);
        response.total_count = Some(total);
        response.limit = Some(limit);
        response.next_link = next_link.map(str::to_string);
        self.route(method, url, Ok(response));
    }

    pub fn fail(&self, method: HttpMethod, url: &str, error: TransportError) {
        self.route(method, url, Err(error));
    }

    pub fn route(
        &self,
        method: HttpMethod,
        url: &str,
        response: Result<RemoteResponse, TransportError>,
    ) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, url.to_string()), response);
    }

    pub fn requests(&self) -> Vec<OcpiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, method: HttpMethod, url: &str) -> Vec<OcpiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    /// Requests whose URL starts with `prefix`
    pub fn requests_under(&self, prefix: &str) -> Vec<OcpiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl OcpiTransport for RecordingTransport {
    async fn send(&self, request: OcpiRequest) -> Result<RemoteResponse, TransportError> {
        let key = (request.method, request.url.clone());
        self.requests.lock().unwrap().push(request);
        match self.routes.lock().unwrap().get(&key) {
            Some(response) => response.clone(),
            None => Err(TransportError::SendFailed {
                url: key.1,
                reason: "no route".into(),
            }),
        }
    }
}

pub mod fixtures {
    use crate::domain::module::{InterfaceRole, ModuleId};
    use crate::domain::platform::{Endpoint, LocalIdentity, Party, PartyRole, Platform};

    pub const VERSION: &str = "2.2.1";

    pub fn identity() -> LocalIdentity {
        LocalIdentity {
            platform_id: "LOCAL".into(),
            name: "Texnouz".into(),
            base_url: "https://node.example".into(),
            versions: vec![VERSION.into(), "2.1.1".into()],
            parties: vec![Party::new("NL", "ABC", vec![PartyRole::Cpo], "LOCAL")],
        }
    }

    pub fn module_url(platform_id: &str, module: ModuleId) -> String {
        format!(
            "https://{}.example/ocpi/{}/{}",
            platform_id.to_ascii_lowercase(),
            VERSION,
            module.as_str()
        )
    }

    /// Platform with SENDER and RECEIVER endpoints for every module
    pub fn connected_platform(id: &str) -> Platform {
        let mut platform = Platform::new_remote(id, id, vec![VERSION.into()]);
        let mut endpoints = Vec::new();
        for module in ModuleId::SYNCHRONIZED.iter().chain([ModuleId::Commands].iter()) {
            for role in [InterfaceRole::Sender, InterfaceRole::Receiver] {
                endpoints.push(Endpoint::new(*module, Some(role), VERSION, module_url(id, *module)));
            }
        }
        platform.token_b = Some(format!("{}-token-b", id.to_ascii_lowercase()));
        platform
            .mark_connected(format!("{}-token-c", id.to_ascii_lowercase()), VERSION.into(), endpoints)
            .unwrap();
        platform
    }

    /// Remote party operating under `platform_id`
    pub fn remote_party(platform_id: &str, country_code: &str, party_id: &str) -> Party {
        Party::new(country_code, party_id, vec![PartyRole::Emsp, PartyRole::Cpo], platform_id)
    }
}
