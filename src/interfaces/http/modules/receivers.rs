//! Receiver interface for the flat modules (sessions, tariffs, tokens,
//! hubclientinfo) and the CDR collection

use axum::extract::{Path, State};
use axum::http::header::{HeaderValue, LOCATION};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ensure_version;
use crate::application::SynchronizerFor;
use crate::application::Synchronizers;
use crate::domain::{Cdr, EntityKey, SyncEntity};
use crate::interfaces::http::common::{ApiResult, OcpiResponse};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::router::AppState;
use crate::shared::errors::DomainError;

/// `/{version}/{module}/{country_code}/{party_id}[/{id}]`
///
/// Hub client info has no id segment; it is keyed by its party.
#[derive(Debug, Deserialize)]
pub struct ObjectPath {
    pub version: String,
    pub country_code: String,
    pub party_id: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl ObjectPath {
    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.party_id)
    }
}

pub async fn put_object<T: SyncEntity>(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<ObjectPath>,
    Json(body): Json<Value>,
) -> ApiResult<OcpiResponse<()>>
where
    Synchronizers: SynchronizerFor<T>,
{
    ensure_version(&state.identity, &path.version)?;
    let entity = T::from_wire(body)?;
    if entity.key() != EntityKey::new(T::MODULE, &path.country_code, &path.party_id, path.id()) {
        return Err(DomainError::Validation(format!(
            "{} identifiers in body and path differ",
            T::NAME
        ))
        .into());
    }
    let outcome = state
        .synchronizers
        .get::<T>()
        .on_remote_put(&caller.platform_id, entity)
        .await?;
    debug!(module = %T::MODULE, outcome = outcome.as_str(), "Remote PUT handled");
    Ok(OcpiResponse::empty())
}

pub async fn patch_object<T: SyncEntity>(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<ObjectPath>,
    Json(patch): Json<Value>,
) -> ApiResult<OcpiResponse<()>>
where
    Synchronizers: SynchronizerFor<T>,
{
    ensure_version(&state.identity, &path.version)?;
    let outcome = state
        .synchronizers
        .get::<T>()
        .on_remote_patch(
            &caller.platform_id,
            &path.country_code,
            &path.party_id,
            path.id(),
            patch,
        )
        .await?;
    debug!(module = %T::MODULE, outcome = outcome.as_str(), "Remote PATCH handled");
    Ok(OcpiResponse::empty())
}

pub async fn get_object<T: SyncEntity>(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<ObjectPath>,
) -> ApiResult<OcpiResponse<Value>>
where
    Synchronizers: SynchronizerFor<T>,
{
    ensure_version(&state.identity, &path.version)?;
    let entity = state
        .synchronizers
        .get::<T>()
        .on_remote_get(&caller.platform_id, &path.country_code, &path.party_id, path.id())
        .await?;
    Ok(OcpiResponse::success(entity.to_wire()?))
}

/// `POST /{version}/cdrs`: CDRs are created on the collection and are
/// addressable afterwards through the returned `Location` header.
pub async fn post_cdr(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(version): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    ensure_version(&state.identity, &version)?;
    let cdr = Cdr::from_wire(body)?;
    let location = format!(
        "{}/{}/{}/{}",
        state.identity.module_url(&version, Cdr::MODULE),
        cdr.country_code(),
        cdr.party_id(),
        cdr.id()
    );
    state
        .synchronizers
        .cdrs
        .on_remote_put(&caller.platform_id, cdr)
        .await?;

    let mut response = OcpiResponse::empty().into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(LOCATION, value);
    }
    Ok(response)
}
