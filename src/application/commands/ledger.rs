//! Guarded command transitions
//!
//! Every path that moves a command out of PENDING (counterpart result,
//! local backend result, deadline sweep) goes through [`CommandLedger::finalize`],
//! so the first writer wins and every later attempt is a logged no-op.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{info, warn};

use crate::application::events::{CommandFinalizedEvent, Event, SharedEventBus};
use crate::domain::command::{Command, CommandStatus, CommandType, TransitionOutcome};
use crate::domain::reservation::Reservation;
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainError, DomainResult};

#[derive(Clone)]
pub struct CommandLedger {
    repos: Arc<dyn RepositoryProvider>,
    event_bus: Option<SharedEventBus>,
}

impl CommandLedger {
    pub fn new(repos: Arc<dyn RepositoryProvider>, event_bus: Option<SharedEventBus>) -> Self {
        Self { repos, event_bus }
    }

    /// Persist a new PENDING command.
    pub async fn open(&self, command: Command) -> DomainResult<Command> {
        self.repos.commands().save(command.clone()).await?;
        counter!(
            "ocpi_commands_total",
            "type" => command.command_type.as_str(),
            "status" => CommandStatus::Pending.as_str()
        )
        .increment(1);
        Ok(command)
    }

    /// Compare-and-set PENDING -> `status`.
    pub async fn finalize(
        &self,
        command: &Command,
        status: CommandStatus,
        message: Option<String>,
    ) -> DomainResult<TransitionOutcome> {
        let at = Utc::now();
        let applied = self
            .repos
            .commands()
            .finalize(&command.uid, status, message.clone(), at)
            .await?;

        if !applied {
            let current = self
                .repos
                .commands()
                .find_by_uid(&command.uid)
                .await?
                .map_or(CommandStatus::Unknown, |c| c.status);
            warn!(
                uid = %command.uid,
                platform_id = %command.platform_id,
                current = %current,
                attempted = %status,
                "command bad status"
            );
            return Ok(TransitionOutcome::AlreadyFinal(current));
        }

        counter!(
            "ocpi_commands_total",
            "type" => command.command_type.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
        info!(
            uid = %command.uid,
            platform_id = %command.platform_id,
            command_type = %command.command_type,
            direction = command.direction.as_str(),
            status = %status,
            "Command finalized"
        );

        if status == CommandStatus::Accepted {
            if let Err(e) = self.apply_reservation(command).await {
                warn!(uid = %command.uid, error = %e, "Reservation bookkeeping failed");
            }
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(Event::CommandFinalized(CommandFinalizedEvent {
                platform_id: command.platform_id.clone(),
                uid: command.uid.clone(),
                command_type: command.command_type.as_str().to_string(),
                direction: command.direction.as_str().to_string(),
                status: status.as_str().to_string(),
                message,
                timestamp: at,
            }));
        }

        Ok(TransitionOutcome::Applied(status))
    }

    async fn apply_reservation(&self, command: &Command) -> DomainResult<()> {
        let target = &command.target;
        match command.command_type {
            CommandType::ReserveNow => {
                let (Some(reservation_id), Some(location_id), Some(expiry_date)) = (
                    target.reservation_id.clone(),
                    target.location_id.clone(),
                    target.expiry_date,
                ) else {
                    return Err(DomainError::Validation(format!(
                        "RESERVE_NOW {} lacks reservation attributes",
                        command.uid
                    )));
                };
                self.repos
                    .reservations()
                    .save(Reservation::new(
                        reservation_id,
                        command.platform_id.clone(),
                        location_id,
                        target.evse_uid.clone(),
                        target.token_uid.clone(),
                        expiry_date,
                    ))
                    .await
            }
            CommandType::CancelReservation => {
                if let Some(reservation_id) = &target.reservation_id {
                    self.repos
                        .reservations()
                        .cancel(&command.platform_id, reservation_id)
                        .await?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
