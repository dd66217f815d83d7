//! Commands module: remote command requests and results for commands
//! this node issued

use axum::extract::{Path, State};
use axum::{Extension, Json};
use tracing::info;

use super::ensure_version;
use crate::application::commands::{CommandRequest, CommandResponse, CommandResult};
use crate::domain::command::{CommandResponseType, CommandType, TransitionOutcome};
use crate::interfaces::http::common::{ApiResult, OcpiResponse};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::router::AppState;
use crate::shared::errors::DomainError;

/// `POST /{version}/commands/{command}`
pub async fn receive_command(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((version, command)): Path<(String, String)>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<OcpiResponse<CommandResponse>> {
    ensure_version(&state.identity, &version)?;
    let Some(command_type) = CommandType::parse(&command) else {
        return Ok(OcpiResponse::success(CommandResponse::refused(
            CommandResponseType::NotSupported,
            0,
            format!("command {} is not supported", command),
        )));
    };
    let response = state
        .commands
        .on_remote_command(&caller.platform_id, command_type, request)
        .await?;
    Ok(OcpiResponse::success(response))
}

/// `POST /{version}/commands/{command}/{uid}`: asynchronous result
pub async fn receive_result(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((version, command, uid)): Path<(String, String, String)>,
    Json(result): Json<CommandResult>,
) -> ApiResult<OcpiResponse<()>> {
    ensure_version(&state.identity, &version)?;
    let command_type = CommandType::parse(&command)
        .ok_or_else(|| DomainError::not_found("Command", "type", command.clone()))?;
    let outcome = state
        .commands
        .on_remote_set_response(&caller.platform_id, command_type, &uid, result)
        .await?;
    if let TransitionOutcome::AlreadyFinal(status) = outcome {
        info!(uid = %uid, status = %status, "Duplicate command result ignored");
    }
    Ok(OcpiResponse::empty())
}
