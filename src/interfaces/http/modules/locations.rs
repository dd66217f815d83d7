//! Locations receiver: PUT, PATCH and GET at location, EVSE and
//! connector level

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ensure_version;
use crate::domain::LocationTarget;
use crate::interfaces::http::common::{ApiResult, OcpiResponse};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::router::AppState;

#[derive(Debug, Deserialize)]
pub struct LocationPath {
    pub version: String,
    pub country_code: String,
    pub party_id: String,
    pub location_id: String,
    #[serde(default)]
    pub evse_uid: Option<String>,
    #[serde(default)]
    pub connector_id: Option<String>,
}

impl LocationPath {
    fn target(&self) -> LocationTarget {
        match (&self.evse_uid, &self.connector_id) {
            (Some(evse_uid), Some(connector_id)) => LocationTarget::Connector {
                evse_uid: evse_uid.clone(),
                connector_id: connector_id.clone(),
            },
            (Some(evse_uid), None) => LocationTarget::Evse {
                evse_uid: evse_uid.clone(),
            },
            _ => LocationTarget::Location,
        }
    }
}

pub async fn put_location(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<LocationPath>,
    Json(body): Json<Value>,
) -> ApiResult<OcpiResponse<()>> {
    ensure_version(&state.identity, &path.version)?;
    let outcome = state
        .synchronizers
        .locations
        .on_remote_location_put(
            &caller.platform_id,
            &path.country_code,
            &path.party_id,
            &path.location_id,
            path.target(),
            body,
        )
        .await?;
    debug!(location_id = %path.location_id, outcome = outcome.as_str(), "Location PUT handled");
    Ok(OcpiResponse::empty())
}

pub async fn patch_location(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<LocationPath>,
    Json(patch): Json<Value>,
) -> ApiResult<OcpiResponse<()>> {
    ensure_version(&state.identity, &path.version)?;
    let outcome = state
        .synchronizers
        .locations
        .on_remote_location_patch(
            &caller.platform_id,
            &path.country_code,
            &path.party_id,
            &path.location_id,
            path.target(),
            patch,
        )
        .await?;
    debug!(location_id = %path.location_id, outcome = outcome.as_str(), "Location PATCH handled");
    Ok(OcpiResponse::empty())
}

pub async fn get_location(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(path): Path<LocationPath>,
) -> ApiResult<OcpiResponse<Value>> {
    ensure_version(&state.identity, &path.version)?;
    let object = state
        .synchronizers
        .locations
        .on_remote_location_get(
            &caller.platform_id,
            &path.country_code,
            &path.party_id,
            &path.location_id,
            path.target(),
        )
        .await?;
    Ok(OcpiResponse::success(object))
}
