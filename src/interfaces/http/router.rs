//! OCPI router
//!
//! Everything under `/ocpi` requires a recognised platform token;
//! `/metrics` is open.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::token_auth_middleware;
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::request_id::request_id_middleware;
use super::modules::{commands, credentials, locations, receivers, senders, versions};
use crate::application::commands::CommandService;
use crate::application::credentials::CredentialsService;
use crate::application::sync::Synchronizers;
use crate::domain::{ClientInfo, LocalIdentity, Location, RepositoryProvider, Session, Tariff, Token};
use crate::domain::Cdr;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub repos: Arc<dyn RepositoryProvider>,
    pub identity: Arc<LocalIdentity>,
    pub credentials: Arc<CredentialsService>,
    pub synchronizers: Arc<Synchronizers>,
    pub commands: Arc<CommandService>,
}

fn ocpi_routes(state: AppState) -> Router {
    Router::new()
        // Versions
        .route("/ocpi/versions", get(versions::list_versions))
        .route("/ocpi/{version}", get(versions::version_details))
        // Credentials
        .route(
            "/ocpi/{version}/credentials",
            get(credentials::get_credentials)
                .post(credentials::post_credentials)
                .put(credentials::put_credentials)
                .delete(credentials::delete_credentials),
        )
        // Locations
        .route("/ocpi/{version}/locations", get(senders::list_objects::<Location>))
        .route(
            "/ocpi/{version}/locations/{country_code}/{party_id}/{location_id}",
            get(locations::get_location)
                .put(locations::put_location)
                .patch(locations::patch_location),
        )
        .route(
            "/ocpi/{version}/locations/{country_code}/{party_id}/{location_id}/{evse_uid}",
            get(locations::get_location)
                .put(locations::put_location)
                .patch(locations::patch_location),
        )
        .route(
            "/ocpi/{version}/locations/{country_code}/{party_id}/{location_id}/{evse_uid}/{connector_id}",
            get(locations::get_location)
                .put(locations::put_location)
                .patch(locations::patch_location),
        )
        // Sessions
        .route("/ocpi/{version}/sessions", get(senders::list_objects::<Session>))
        .route(
            "/ocpi/{version}/sessions/{country_code}/{party_id}/{id}",
            get(receivers::get_object::<Session>)
                .put(receivers::put_object::<Session>)
                .patch(receivers::patch_object::<Session>),
        )
        // Tariffs
        .route("/ocpi/{version}/tariffs", get(senders::list_objects::<Tariff>))
        .route(
            "/ocpi/{version}/tariffs/{country_code}/{party_id}/{id}",
            get(receivers::get_object::<Tariff>)
                .put(receivers::put_object::<Tariff>)
                .patch(receivers::patch_object::<Tariff>),
        )
        // Tokens
        .route("/ocpi/{version}/tokens", get(senders::list_objects::<Token>))
        .route(
            "/ocpi/{version}/tokens/{country_code}/{party_id}/{id}",
            get(receivers::get_object::<Token>)
                .put(receivers::put_object::<Token>)
                .patch(receivers::patch_object::<Token>),
        )
        // CDRs
        .route(
            "/ocpi/{version}/cdrs",
            get(senders::list_objects::<Cdr>).post(receivers::post_cdr),
        )
        .route(
            "/ocpi/{version}/cdrs/{country_code}/{party_id}/{id}",
            get(receivers::get_object::<Cdr>),
        )
        // Hub client info
        .route("/ocpi/{version}/hubclientinfo", get(senders::list_objects::<ClientInfo>))
        .route(
            "/ocpi/{version}/hubclientinfo/{country_code}/{party_id}",
            get(receivers::get_object::<ClientInfo>)
                .put(receivers::put_object::<ClientInfo>)
                .patch(receivers::patch_object::<ClientInfo>),
        )
        // Commands
        .route("/ocpi/{version}/commands/{command}", post(commands::receive_command))
        .route(
            "/ocpi/{version}/commands/{command}/{uid}",
            post(commands::receive_result),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            token_auth_middleware,
        ))
        .with_state(state)
}

/// Build the full router: OCPI routes, optional `/metrics`, and the
/// request-scoped layers.
pub fn create_ocpi_router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let mut router = ocpi_routes(state);
    if let Some(handle) = metrics {
        router = router.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(MetricsState { handle }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::application::dispatch::default_error_handler;
    use crate::application::registry::PlatformClientRegistry;
    use crate::application::testing::fixtures::{connected_platform, identity, remote_party, VERSION};
    use crate::application::testing::RecordingTransport;
    use crate::domain::module::ModuleId;
    use crate::domain::sync::{EntityKey, StoredEntity};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    pub(crate) async fn test_state() -> (AppState, Arc<RecordingTransport>) {
        let repos: Arc<dyn RepositoryProvider> = InMemoryRepositoryProvider::shared();
        let transport = Arc::new(RecordingTransport::new());
        let registry = PlatformClientRegistry::shared(transport.clone());
        let identity = Arc::new(identity());
        let on_error = default_error_handler(None);
        let state = AppState {
            repos: repos.clone(),
            identity: identity.clone(),
            credentials: Arc::new(CredentialsService::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
            )),
            synchronizers: Arc::new(Synchronizers::new(
                repos.clone(),
                registry.clone(),
                identity.clone(),
                on_error.clone(),
                50,
            )),
            commands: Arc::new(CommandService::new(repos, registry, identity, on_error, 30)),
        };
        (state, transport)
    }

    /// State with P1 connected and owning party DE/XYZ
    async fn connected_state() -> AppState {
        let (state, _) = test_state().await;
        state.repos.platforms().save(connected_platform("P1")).await.unwrap();
        state
            .repos
            .parties()
            .replace_for_platform("P1", vec![remote_party("P1", "DE", "XYZ")])
            .await
            .unwrap();
        state
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Token p1-token-b");
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        create_ocpi_router(state.clone(), None)
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn envelope(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn tariff(cc: &str, pid: &str, id: &str) -> Value {
        json!({
            "country_code": cc,
            "party_id": pid,
            "id": id,
            "currency": "EUR",
            "elements": [{"price_components": [{"type": "ENERGY", "price": 0.25, "step_size": 1}]}],
            "last_updated": "2024-05-01T12:00:00Z"
        })
    }

    #[tokio::test]
    async fn versions_are_listed_and_unknown_versions_refused() {
        let state = connected_state().await;

        let response = send(&state, Method::GET, "/ocpi/versions", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope(response).await;
        assert_eq!(body["status_code"], 1000);
        assert_eq!(body["data"][0]["url"], "https://node.example/ocpi/2.2.1");

        let response = send(&state, Method::GET, "/ocpi/2.2.1", None).await;
        let body = envelope(response).await;
        let endpoints = body["data"]["endpoints"].as_array().unwrap();
        assert!(endpoints.iter().any(|e| e["identifier"] == "commands"));

        let response = send(&state, Method::GET, "/ocpi/9.9", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(response).await["status_code"], 3002);
    }

    #[tokio::test]
    async fn pushed_tariff_can_be_read_back() {
        let state = connected_state().await;
        let uri = format!("/ocpi/{}/tariffs/DE/XYZ/T1", VERSION);

        let response = send(&state, Method::PUT, &uri, Some(tariff("DE", "XYZ", "T1"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, Method::GET, &uri, None).await;
        let body = envelope(response).await;
        assert_eq!(body["data"]["currency"], "EUR");

        let response = send(&state, Method::PATCH, &uri, Some(json!({"currency": "USD"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(response).await["status_code"], 2001);
    }

    #[tokio::test]
    async fn path_and_body_identifiers_must_agree() {
        let state = connected_state().await;
        let uri = format!("/ocpi/{}/tariffs/DE/XYZ/T2", VERSION);
        let response = send(&state, Method::PUT, &uri, Some(tariff("DE", "XYZ", "T1"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn foreign_party_is_forbidden() {
        let state = connected_state().await;
        let uri = format!("/ocpi/{}/tariffs/NL/ABC/T1", VERSION);
        let response = send(&state, Method::PUT, &uri, Some(tariff("NL", "ABC", "T1"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_location_answers_2003() {
        let state = connected_state().await;
        let uri = format!("/ocpi/{}/locations/DE/XYZ/L9/E1", VERSION);
        let response = send(&state, Method::GET, &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(envelope(response).await["status_code"], 2003);
    }

    #[tokio::test]
    async fn sender_listing_is_paginated() {
        let state = connected_state().await;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for (i, id) in ["T1", "T2", "T3"].iter().enumerate() {
            state
                .repos
                .entities()
                .upsert_if_newer(StoredEntity {
                    key: EntityKey::new(ModuleId::Tariffs, "NL", "ABC", *id),
                    platform_id: "LOCAL".into(),
                    last_updated: t0 + chrono::Duration::minutes(i as i64),
                    payload: tariff("NL", "ABC", id),
                })
                .await
                .unwrap();
        }

        let uri = format!("/ocpi/{}/tariffs?limit=2", VERSION);
        let response = send(&state, Method::GET, &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-total-count"], "3");
        assert_eq!(response.headers()["x-limit"], "2");
        assert_eq!(
            response.headers()[header::LINK],
            "<https://node.example/ocpi/2.2.1/tariffs?offset=2&limit=2>; rel=\"next\""
        );
        let body = envelope(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let uri = format!("/ocpi/{}/tariffs?offset=2&limit=2", VERSION);
        let response = send(&state, Method::GET, &uri, None).await;
        assert!(response.headers().get(header::LINK).is_none());
    }

    #[tokio::test]
    async fn command_requests_are_acknowledged() {
        let state = connected_state().await;

        let uri = format!("/ocpi/{}/commands/STOP_SESSION", VERSION);
        let request = json!({"response_url": "https://p1.example/cb/1", "session_id": "S9"});
        let body = envelope(send(&state, Method::POST, &uri, Some(request)).await).await;
        assert_eq!(body["status_code"], 1000);
        assert_eq!(body["data"]["result"], "UNKNOWN_SESSION");

        let uri = format!("/ocpi/{}/commands/TELEPORT", VERSION);
        let request = json!({"response_url": "https://p1.example/cb/2"});
        let body = envelope(send(&state, Method::POST, &uri, Some(request)).await).await;
        assert_eq!(body["data"]["result"], "NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn result_for_unknown_command_is_not_found() {
        let state = connected_state().await;
        let uri = format!("/ocpi/{}/commands/START_SESSION/nope", VERSION);
        let response = send(&state, Method::POST, &uri, Some(json!({"result": "ACCEPTED"}))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(envelope(response).await["status_code"], 2000);
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let (state, _) = test_state().await;
        let response = create_ocpi_router(state, None)
            .oneshot(Request::builder().uri("/ocpi/versions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(envelope(response).await["status_code"], 2000);
    }
}
