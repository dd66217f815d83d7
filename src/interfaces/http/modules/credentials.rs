//! Credentials module: the inbound half of the handshake

use axum::extract::{Path, State};
use axum::Extension;

use super::ensure_version;
use crate::application::credentials::dto::Credentials;
use crate::application::HandshakeMode;
use crate::interfaces::http::common::{ApiResult, OcpiResponse, ValidatedJson};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::router::AppState;

pub async fn get_credentials(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(version): Path<String>,
) -> ApiResult<OcpiResponse<Credentials>> {
    ensure_version(&state.identity, &version)?;
    let credentials = state
        .credentials
        .on_remote_get_credentials(&caller.platform_id)
        .await?;
    Ok(OcpiResponse::success(credentials))
}

/// POST: registration with token A
pub async fn post_credentials(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(version): Path<String>,
    ValidatedJson(body): ValidatedJson<Credentials>,
) -> ApiResult<OcpiResponse<Credentials>> {
    accept(state, caller, version, body, HandshakeMode::Register).await
}

/// PUT: token rotation on a connected platform
pub async fn put_credentials(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(version): Path<String>,
    ValidatedJson(body): ValidatedJson<Credentials>,
) -> ApiResult<OcpiResponse<Credentials>> {
    accept(state, caller, version, body, HandshakeMode::Update).await
}

async fn accept(
    state: AppState,
    caller: Caller,
    version: String,
    body: Credentials,
    mode: HandshakeMode,
) -> ApiResult<OcpiResponse<Credentials>> {
    ensure_version(&state.identity, &version)?;
    let credentials = state
        .credentials
        .accept_connection(&caller.platform_id, &caller.token, body, mode)
        .await?;
    Ok(OcpiResponse::success(credentials))
}

pub async fn delete_credentials(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(version): Path<String>,
) -> ApiResult<OcpiResponse<()>> {
    ensure_version(&state.identity, &version)?;
    state
        .credentials
        .on_remote_delete_credentials(&caller.platform_id)
        .await?;
    Ok(OcpiResponse::empty())
}
