//! Versions module: `GET /ocpi/versions` and `GET /ocpi/{version}`

use axum::extract::{Path, State};

use super::ensure_version;
use crate::application::credentials::dto::{VersionDetails, VersionInfo};
use crate::interfaces::http::common::{ApiResult, OcpiResponse};
use crate::interfaces::http::router::AppState;

pub async fn list_versions(State(state): State<AppState>) -> OcpiResponse<Vec<VersionInfo>> {
    let versions = state
        .identity
        .versions
        .iter()
        .map(|v| VersionInfo {
            version: v.clone(),
            url: state.identity.version_url(v),
        })
        .collect();
    OcpiResponse::success(versions)
}

pub async fn version_details(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> ApiResult<OcpiResponse<VersionDetails>> {
    ensure_version(&state.identity, &version)?;
    let endpoints = state.identity.endpoints(&version);
    Ok(OcpiResponse::success(VersionDetails::from_endpoints(&version, &endpoints)))
}
