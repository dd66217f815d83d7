//! Command lifecycle: issuing commands to counterparts, accepting theirs,
//! correlating asynchronous results and expiring what never got one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::dto::{CommandRequest, CommandResponse, CommandResult};
use super::ledger::CommandLedger;
use crate::application::dispatch::{DispatchFailure, Dispatched, ErrorHandler};
use crate::application::events::{Event, RemoteCommandReceivedEvent, SharedEventBus};
use crate::application::ports::HttpMethod;
use crate::application::registry::SharedClientRegistry;
use crate::domain::command::{
    Command, CommandDirection, CommandResponseType, CommandResultType, CommandStatus, CommandType,
    TransitionOutcome,
};
use crate::domain::location::Location;
use crate::domain::module::{InterfaceRole, ModuleId};
use crate::domain::platform::{LocalIdentity, Platform};
use crate::domain::session::Session;
use crate::domain::sync::{EntityKey, SyncEntity};
use crate::domain::RepositoryProvider;
use crate::shared::errors::{DomainError, DomainResult, TransportError};

/// A command persisted PENDING plus its in-flight delivery
#[derive(Debug)]
pub struct IssuedCommand {
    pub command: Command,
    pub dispatched: Dispatched,
}

/// Commands a deadline sweep moved to EXPIRED
#[derive(Debug, Default)]
pub struct DeadlineSweep {
    pub expired: Vec<String>,
    /// TIMEOUT results forwarded to counterparts
    pub dispatched: Dispatched,
}

pub struct CommandService {
    repos: Arc<dyn RepositoryProvider>,
    registry: SharedClientRegistry,
    identity: Arc<LocalIdentity>,
    ledger: CommandLedger,
    event_bus: Option<SharedEventBus>,
    on_error: ErrorHandler,
    timeout: Duration,
}

impl CommandService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SharedClientRegistry,
        identity: Arc<LocalIdentity>,
        on_error: ErrorHandler,
        timeout_secs: u64,
    ) -> Self {
        Self {
            ledger: CommandLedger::new(repos.clone(), None),
            repos,
            registry,
            identity,
            event_bus: None,
            on_error,
            timeout: Duration::seconds(timeout_secs as i64),
        }
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.ledger = CommandLedger::new(self.repos.clone(), Some(event_bus.clone()));
        self.event_bus = Some(event_bus);
        self
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout.num_seconds().max(0) as u64
    }

    // ── Local-originated ───────────────────────────────────────

    pub async fn on_local_start_session(
        &self,
        platform_id: &str,
        token: Value,
        location_id: &str,
        evse_uid: Option<String>,
        connector_id: Option<String>,
        authorization_reference: Option<String>,
    ) -> DomainResult<IssuedCommand> {
        let request = CommandRequest {
            token: Some(token),
            location_id: Some(location_id.to_string()),
            evse_uid,
            connector_id,
            authorization_reference,
            ..Default::default()
        };
        self.on_local_command(platform_id, CommandType::StartSession, request)
            .await
    }

    pub async fn on_local_stop_session(
        &self,
        platform_id: &str,
        session_id: &str,
    ) -> DomainResult<IssuedCommand> {
        let request = CommandRequest {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        };
        self.on_local_command(platform_id, CommandType::StopSession, request)
            .await
    }

    pub async fn on_local_reserve_now(
        &self,
        platform_id: &str,
        token: Value,
        reservation_id: &str,
        location_id: &str,
        evse_uid: Option<String>,
        expiry_date: DateTime<Utc>,
    ) -> DomainResult<IssuedCommand> {
        let request = CommandRequest {
            token: Some(token),
            reservation_id: Some(reservation_id.to_string()),
            location_id: Some(location_id.to_string()),
            evse_uid,
            expiry_date: Some(expiry_date),
            ..Default::default()
        };
        self.on_local_command(platform_id, CommandType::ReserveNow, request)
            .await
    }

    pub async fn on_local_cancel_reservation(
        &self,
        platform_id: &str,
        reservation_id: &str,
    ) -> DomainResult<IssuedCommand> {
        let request = CommandRequest {
            reservation_id: Some(reservation_id.to_string()),
            ..Default::default()
        };
        self.on_local_command(platform_id, CommandType::CancelReservation, request)
            .await
    }

    pub async fn on_local_unlock_connector(
        &self,
        platform_id: &str,
        location_id: &str,
        evse_uid: &str,
        connector_id: &str,
    ) -> DomainResult<IssuedCommand> {
        let request = CommandRequest {
            location_id: Some(location_id.to_string()),
            evse_uid: Some(evse_uid.to_string()),
            connector_id: Some(connector_id.to_string()),
            ..Default::default()
        };
        self.on_local_command(platform_id, CommandType::UnlockConnector, request)
            .await
    }

    /// Validate, persist PENDING, then dispatch to the counterpart's
    /// commands receiver. Delivery failures go to the error handler.
    #[instrument(skip(self, request), fields(command_type = %command_type))]
    pub async fn on_local_command(
        &self,
        platform_id: &str,
        command_type: CommandType,
        mut request: CommandRequest,
    ) -> DomainResult<IssuedCommand> {
        let platform = self.connected_platform(platform_id).await?;
        let client = self.registry.client_for(&platform)?;
        let endpoint = client
            .endpoint_url(ModuleId::Commands, InterfaceRole::Receiver)?
            .trim_end_matches('/')
            .to_string();

        let uid = uuid::Uuid::new_v4().to_string();
        let version = platform
            .current_version
            .clone()
            .or_else(|| self.identity.versions.first().cloned())
            .unwrap_or_default();
        request.response_url = format!(
            "{}/{}/{}",
            self.identity.module_url(&version, ModuleId::Commands),
            command_type,
            uid
        );
        request.validate_for(command_type)?;

        if let Some(reservation_id) = &request.reservation_id {
            let existing = self
                .repos
                .reservations()
                .find_by_id(&platform.id, reservation_id)
                .await?;
            match command_type {
                CommandType::CancelReservation => match existing {
                    Some(r) if r.is_active() => {}
                    _ => {
                        return Err(DomainError::not_found(
                            "Reservation",
                            "reservation_id",
                            reservation_id.clone(),
                        ))
                    }
                },
                CommandType::ReserveNow if existing.as_ref().is_some_and(|r| r.is_active()) => {
                    return Err(DomainError::Conflict(format!(
                        "reservation {} is already active",
                        reservation_id
                    )));
                }
                _ => {}
            }
        }

        let mut command = Command::new_pending(
            uid,
            command_type,
            CommandDirection::LocalOriginated,
            platform.id.clone(),
            request.target(),
            self.timeout,
        );
        command.response_url = Some(request.response_url.clone());
        command.authorization_reference = request.authorization_reference.clone();
        let command = self.ledger.open(command).await?;
        info!(uid = %command.uid, platform_id = %platform.id, "Command issued");

        let body = serde_json::to_value(&request)
            .map_err(|e| DomainError::Storage(format!("command serialization: {}", e)))?;
        let outbound = client
            .request(HttpMethod::Post, format!("{}/{}", endpoint, command_type))
            .body(body);
        let ledger = self.ledger.clone();
        let pending = command.clone();

        let mut dispatched = Dispatched::new();
        dispatched.spawn(
            &platform.id,
            ModuleId::Commands,
            &command.uid,
            self.on_error.clone(),
            async move {
                let url = outbound.url.clone();
                let response = client.send(outbound).await?;
                let ack: CommandResponse = serde_json::from_value(response.data).map_err(|e| {
                    TransportError::Malformed {
                        url,
                        reason: e.to_string(),
                    }
                })?;
                if ack.result != CommandResponseType::Accepted {
                    ledger
                        .finalize(&pending, CommandStatus::Rejected, Some(ack.result.as_str().to_string()))
                        .await?;
                }
                Ok(())
            },
        );

        Ok(IssuedCommand {
            command,
            dispatched,
        })
    }

    /// Counterpart posted the result of a command this node issued.
    #[instrument(skip(self, result), fields(result = ?result.result))]
    pub async fn on_remote_set_response(
        &self,
        platform_id: &str,
        command_type: CommandType,
        uid: &str,
        result: CommandResult,
    ) -> DomainResult<TransitionOutcome> {
        let command = self.find_command(uid).await?;
        if command.direction != CommandDirection::LocalOriginated
            || command.platform_id != platform_id
            || command.command_type != command_type
        {
            return Err(DomainError::Forbidden(format!(
                "command {} invalid platform {}",
                uid, platform_id
            )));
        }
        self.ledger
            .finalize(&command, result.result.to_status(), result.message_text())
            .await
    }

    // ── Remote-originated ──────────────────────────────────────

    /// Counterpart asks this node to act. Returns the synchronous
    /// acknowledgement; the result follows through `on_local_command_set_response`.
    #[instrument(skip(self, request), fields(command_type = %command_type))]
    pub async fn on_remote_command(
        &self,
        platform_id: &str,
        command_type: CommandType,
        request: CommandRequest,
    ) -> DomainResult<CommandResponse> {
        request.validate_for(command_type)?;
        self.connected_platform(platform_id).await?;
        let timeout = self.timeout_secs();

        match command_type {
            CommandType::StartSession | CommandType::ReserveNow | CommandType::UnlockConnector => {
                self.check_local_connector(&request).await?;
            }
            CommandType::StopSession => {
                let session_id = request.session_id.as_deref().unwrap_or_default();
                if self.find_local::<Session>(session_id).await?.is_none() {
                    return Ok(CommandResponse::refused(
                        CommandResponseType::UnknownSession,
                        timeout,
                        format!("session {} not found", session_id),
                    ));
                }
            }
            CommandType::CancelReservation => {}
        }

        if let Some(reservation_id) = &request.reservation_id {
            let existing = self
                .repos
                .reservations()
                .find_by_id(platform_id, reservation_id)
                .await?;
            let refusal = match (command_type, existing) {
                (CommandType::CancelReservation, Some(r)) if r.is_active() => None,
                (CommandType::CancelReservation, _) => Some("reservation not found"),
                (CommandType::ReserveNow, Some(r)) if r.is_active() => Some("reservation already active"),
                _ => None,
            };
            if let Some(message) = refusal {
                return Ok(CommandResponse::refused(CommandResponseType::Rejected, timeout, message));
            }
        }

        let mut command = Command::new_pending(
            uuid::Uuid::new_v4().to_string(),
            command_type,
            CommandDirection::RemoteOriginated,
            platform_id,
            request.target(),
            self.timeout,
        );
        command.response_url = Some(request.response_url.clone());
        command.authorization_reference = request.authorization_reference.clone();
        let command = self.ledger.open(command).await?;
        info!(uid = %command.uid, platform_id, "Remote command accepted for processing");

        if let Some(bus) = &self.event_bus {
            bus.publish(Event::RemoteCommandReceived(RemoteCommandReceivedEvent {
                platform_id: platform_id.to_string(),
                uid: command.uid.clone(),
                command_type: command_type.as_str().to_string(),
                location_id: command.target.location_id.clone(),
                evse_uid: command.target.evse_uid.clone(),
                connector_id: command.target.connector_id.clone(),
                timestamp: Utc::now(),
            }));
        }

        Ok(CommandResponse::accepted(timeout))
    }

    /// Local backend reports the result of a command a counterpart sent;
    /// the result is forwarded to the counterpart's `response_url`.
    pub async fn on_local_command_set_response(
        &self,
        uid: &str,
        result: CommandResultType,
        message: Option<String>,
    ) -> DomainResult<(TransitionOutcome, Dispatched)> {
        let command = self.find_command(uid).await?;
        if command.direction != CommandDirection::RemoteOriginated {
            return Err(DomainError::Validation(format!(
                "command {} was issued by this node",
                uid
            )));
        }
        let outcome = self
            .ledger
            .finalize(&command, result.to_status(), message.clone())
            .await?;
        let dispatched = if outcome.applied() {
            self.forward_result(&command, CommandResult::new(result, message))
                .await?
        } else {
            Dispatched::new()
        };
        Ok((outcome, dispatched))
    }

    // ── Deadline sweeps ────────────────────────────────────────

    /// Expire commands this node issued that never got a result.
    pub async fn local_commands_deadline_cron_handler(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<DeadlineSweep> {
        self.sweep(CommandDirection::LocalOriginated, now).await
    }

    /// Expire commands received from counterparts that the local backend
    /// never answered, reporting TIMEOUT to the counterpart.
    pub async fn remote_commands_deadline_cron_handler(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<DeadlineSweep> {
        self.sweep(CommandDirection::RemoteOriginated, now).await
    }

    async fn sweep(&self, direction: CommandDirection, now: DateTime<Utc>) -> DomainResult<DeadlineSweep> {
        let overdue = self.repos.commands().find_overdue(direction, now).await?;
        let mut sweep = DeadlineSweep::default();
        for command in overdue {
            let outcome = match self
                .ledger
                .finalize(&command, CommandStatus::Expired, Some("no result before deadline".into()))
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(uid = %command.uid, error = %e, "Failed to expire command");
                    continue;
                }
            };
            if !outcome.applied() {
                continue;
            }
            if direction == CommandDirection::RemoteOriginated {
                match self
                    .forward_result(&command, CommandResult::new(CommandResultType::Timeout, None))
                    .await
                {
                    Ok(dispatched) => sweep.dispatched.extend(dispatched),
                    Err(e) => warn!(uid = %command.uid, error = %e, "Failed to report timeout"),
                }
            }
            sweep.expired.push(command.uid);
        }
        if !sweep.expired.is_empty() {
            info!(direction = direction.as_str(), count = sweep.expired.len(), "Commands expired");
        }
        Ok(sweep)
    }

    /// Mark ACTIVE reservations past their expiry date as EXPIRED.
    pub async fn expire_reservations(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let lapsed = self.repos.reservations().find_expired(now).await?;
        let mut expired = 0;
        for mut reservation in lapsed {
            reservation.expire();
            let id = reservation.reservation_id.clone();
            match self.repos.reservations().update(reservation).await {
                Ok(()) => expired += 1,
                Err(e) => warn!(reservation_id = %id, error = %e, "Failed to expire reservation"),
            }
        }
        if expired > 0 {
            info!(count = expired, "Reservations expired");
        }
        Ok(expired)
    }

    // ── Helpers ────────────────────────────────────────────────

    async fn forward_result(&self, command: &Command, result: CommandResult) -> DomainResult<Dispatched> {
        let mut dispatched = Dispatched::new();
        let Some(url) = command.response_url.clone() else {
            return Ok(dispatched);
        };
        let platform = match self.repos.platforms().find_by_id(&command.platform_id).await? {
            Some(p) if p.is_connected() => p,
            _ => {
                warn!(uid = %command.uid, platform_id = %command.platform_id, "Result not forwarded, platform not connected");
                return Ok(dispatched);
            }
        };
        let client = match self.registry.client_for(&platform) {
            Ok(client) => client,
            Err(e) => {
                (self.on_error)(DispatchFailure {
                    platform_id: platform.id.clone(),
                    module: ModuleId::Commands,
                    entity_id: command.uid.clone(),
                    error: e.into(),
                });
                return Ok(dispatched);
            }
        };
        let body = serde_json::to_value(&result)
            .map_err(|e| DomainError::Storage(format!("command result serialization: {}", e)))?;
        let request = client.request(HttpMethod::Post, url).body(body);
        debug!(uid = %command.uid, result = ?result.result, "Forwarding command result");
        dispatched.spawn(
            &platform.id,
            ModuleId::Commands,
            &command.uid,
            self.on_error.clone(),
            async move {
                client.send(request).await?;
                Ok(())
            },
        );
        Ok(dispatched)
    }

    async fn connected_platform(&self, platform_id: &str) -> DomainResult<Platform> {
        match self.repos.platforms().find_by_id(platform_id).await? {
            Some(platform) if !platform.is_local && platform.is_connected() => Ok(platform),
            _ => Err(DomainError::Forbidden(format!(
                "command invalid platform {}",
                platform_id
            ))),
        }
    }

    async fn find_command(&self, uid: &str) -> DomainResult<Command> {
        self.repos
            .commands()
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| DomainError::not_found("Command", "uid", uid))
    }

    /// Entity owned by one of the local parties
    async fn find_local<T: SyncEntity>(&self, id: &str) -> DomainResult<Option<T>> {
        for party in &self.identity.parties {
            let key = EntityKey::new(T::MODULE, &party.country_code, &party.party_id, id);
            if let Some(stored) = self.repos.entities().find(&key).await? {
                if stored.platform_id == self.identity.platform_id {
                    return T::from_stored(stored).map(Some);
                }
            }
        }
        Ok(None)
    }

    async fn check_local_connector(&self, request: &CommandRequest) -> DomainResult<()> {
        let location_id = request.location_id.as_deref().unwrap_or_default();
        let location = self
            .find_local::<Location>(location_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Location", "id", location_id))?;
        let Some(evse_uid) = request.evse_uid.as_deref() else {
            return Ok(());
        };
        if location.evse(evse_uid).is_none() {
            return Err(DomainError::not_found("Evse", "uid", evse_uid));
        }
        if let Some(connector_id) = request.connector_id.as_deref() {
            if location.connector(evse_uid, connector_id).is_none() {
                return Err(DomainError::not_found(
                    "Connector",
                    "id",
                    format!("{}/{}", evse_uid, connector_id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::application::registry::PlatformClientRegistry;
    use crate::application::testing::{fixtures, RecordingTransport};
    use crate::domain::location::model::tests::location;
    use crate::domain::reservation::{Reservation, ReservationStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    struct Harness {
        repos: Arc<InMemoryRepositoryProvider>,
        transport: Arc<RecordingTransport>,
        failures: Arc<Mutex<Vec<String>>>,
        service: CommandService,
    }

    async fn harness(timeout_secs: u64) -> Harness {
        let repos = InMemoryRepositoryProvider::shared();
        repos
            .platforms()
            .save(fixtures::connected_platform("P1"))
            .await
            .unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let on_error: ErrorHandler = Arc::new(move |f: DispatchFailure| {
            sink.lock().unwrap().push(f.entity_id);
        });
        let service = CommandService::new(
            repos.clone(),
            PlatformClientRegistry::shared(transport.clone()),
            Arc::new(fixtures::identity()),
            on_error,
            timeout_secs,
        );
        Harness {
            repos,
            transport,
            failures,
            service,
        }
    }

    fn command_url(command_type: CommandType) -> String {
        format!("{}/{}", fixtures::module_url("P1", ModuleId::Commands), command_type)
    }

    fn token() -> Value {
        json!({"uid": "TOKEN-1", "type": "RFID", "contract_id": "NL-ABC-C12345678-X"})
    }

    fn accepted() -> CommandResult {
        CommandResult::new(CommandResultType::Accepted, None)
    }

    async fn stored_status(h: &Harness, uid: &str) -> CommandStatus {
        h.repos.commands().find_by_uid(uid).await.unwrap().unwrap().status
    }

    async fn issue_start(h: &Harness) -> Command {
        h.transport.respond(
            HttpMethod::Post,
            &command_url(CommandType::StartSession),
            json!({"result": "ACCEPTED", "timeout": 30}),
        );
        let issued = h
            .service
            .on_local_start_session("P1", token(), "L1", Some("E1".into()), None, None)
            .await
            .unwrap();
        issued.dispatched.join().await;
        issued.command
    }

    #[tokio::test]
    async fn local_command_is_persisted_and_dispatched_with_callback_url() {
        let h = harness(30).await;
        let command = issue_start(&h).await;

        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Pending);
        let sent = h
            .transport
            .requests_to(HttpMethod::Post, &command_url(CommandType::StartSession));
        assert_eq!(sent.len(), 1);
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(
            body["response_url"],
            format!("https://node.example/ocpi/2.2.1/commands/START_SESSION/{}", command.uid)
        );
        assert_eq!(body["token"]["uid"], "TOKEN-1");
        assert!(h.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refused_acknowledgement_rejects_the_command() {
        let h = harness(30).await;
        h.transport.respond(
            HttpMethod::Post,
            &command_url(CommandType::StopSession),
            json!({"result": "UNKNOWN_SESSION", "timeout": 30}),
        );
        let issued = h.service.on_local_stop_session("P1", "S1").await.unwrap();
        issued.dispatched.join().await;
        assert_eq!(stored_status(&h, &issued.command.uid).await, CommandStatus::Rejected);
    }

    #[tokio::test]
    async fn dispatch_failure_leaves_command_pending() {
        let h = harness(30).await;
        let issued = h
            .service
            .on_local_unlock_connector("P1", "L1", "E1", "C1")
            .await
            .unwrap();
        let uid = issued.command.uid.clone();
        issued.dispatched.join().await;

        assert_eq!(stored_status(&h, &uid).await, CommandStatus::Pending);
        assert_eq!(*h.failures.lock().unwrap(), vec![uid]);
    }

    #[tokio::test]
    async fn result_then_sweep_records_one_terminal_status() {
        let h = harness(0).await;
        let command = issue_start(&h).await;

        let outcome = h
            .service
            .on_remote_set_response("P1", CommandType::StartSession, &command.uid, accepted())
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied(CommandStatus::Accepted));

        let sweep = h
            .service
            .local_commands_deadline_cron_handler(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert!(sweep.expired.is_empty());
        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Accepted);
    }

    #[tokio::test]
    async fn sweep_then_late_result_is_a_no_op() {
        let h = harness(0).await;
        let command = issue_start(&h).await;

        let sweep = h
            .service
            .local_commands_deadline_cron_handler(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(sweep.expired, vec![command.uid.clone()]);

        let late = h
            .service
            .on_remote_set_response("P1", CommandType::StartSession, &command.uid, accepted())
            .await
            .unwrap();
        assert_eq!(late, TransitionOutcome::AlreadyFinal(CommandStatus::Expired));
        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Expired);
    }

    #[tokio::test]
    async fn command_stays_pending_until_its_deadline() {
        let h = harness(30).await;
        let command = issue_start(&h).await;

        let early = h
            .service
            .local_commands_deadline_cron_handler(command.deadline - Duration::seconds(1))
            .await
            .unwrap();
        assert!(early.expired.is_empty());
        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Pending);

        let due = h
            .service
            .local_commands_deadline_cron_handler(command.deadline)
            .await
            .unwrap();
        assert_eq!(due.expired, vec![command.uid.clone()]);
        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Expired);
    }

    #[tokio::test]
    async fn cancelling_unknown_reservation_persists_nothing() {
        let h = harness(30).await;
        let err = h
            .service
            .on_local_cancel_reservation("P1", "R9")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Reservation", .. }));
        assert!(h.transport.requests().is_empty());
        let pending = h
            .repos
            .commands()
            .find_overdue(CommandDirection::LocalOriginated, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn accepted_reservation_can_be_cancelled() {
        let h = harness(30).await;
        h.transport.respond(
            HttpMethod::Post,
            &command_url(CommandType::ReserveNow),
            json!({"result": "ACCEPTED", "timeout": 30}),
        );
        let issued = h
            .service
            .on_local_reserve_now("P1", token(), "R1", "L1", None, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        issued.dispatched.join().await;
        h.service
            .on_remote_set_response("P1", CommandType::ReserveNow, &issued.command.uid, accepted())
            .await
            .unwrap();
        let reservation = h.repos.reservations().find_by_id("P1", "R1").await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Active);

        h.transport.respond(
            HttpMethod::Post,
            &command_url(CommandType::CancelReservation),
            json!({"result": "ACCEPTED", "timeout": 30}),
        );
        let cancel = h.service.on_local_cancel_reservation("P1", "R1").await.unwrap();
        cancel.dispatched.join().await;
        h.service
            .on_remote_set_response(
                "P1",
                CommandType::CancelReservation,
                &cancel.command.uid,
                CommandResult::new(CommandResultType::CanceledReservation, None),
            )
            .await
            .unwrap();
        let reservation = h.repos.reservations().find_by_id("P1", "R1").await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn result_from_another_platform_is_refused() {
        let h = harness(30).await;
        let command = issue_start(&h).await;
        let err = h
            .service
            .on_remote_set_response("P2", CommandType::StartSession, &command.uid, accepted())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(ref m) if m.contains("invalid platform")));
        assert_eq!(stored_status(&h, &command.uid).await, CommandStatus::Pending);

        let err = h
            .service
            .on_remote_set_response("P1", CommandType::StartSession, "nope", accepted())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Command", .. }));
    }

    fn remote_request(connector_id: &str) -> CommandRequest {
        CommandRequest {
            response_url: "https://p1.example/callback/42".into(),
            location_id: Some("L1".into()),
            evse_uid: Some("E1".into()),
            connector_id: Some(connector_id.into()),
            ..Default::default()
        }
    }

    async fn store_local_location(h: &Harness) {
        let stored = location("L1", Utc::now() - Duration::minutes(1))
            .to_stored("LOCAL")
            .unwrap();
        h.repos.entities().upsert_if_newer(stored).await.unwrap();
    }

    #[tokio::test]
    async fn remote_command_for_unknown_connector_is_refused() {
        let h = harness(30).await;
        store_local_location(&h).await;
        let err = h
            .service
            .on_remote_command("P1", CommandType::UnlockConnector, remote_request("C9"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Connector", .. }));

        let err = h
            .service
            .on_remote_command("P2", CommandType::UnlockConnector, remote_request("C1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(ref m) if m.contains("command invalid platform")));
    }

    #[tokio::test]
    async fn remote_command_result_is_forwarded_once() {
        let h = harness(30).await;
        store_local_location(&h).await;
        h.transport
            .respond(HttpMethod::Post, "https://p1.example/callback/42", Value::Null);

        let ack = h
            .service
            .on_remote_command("P1", CommandType::UnlockConnector, remote_request("C1"))
            .await
            .unwrap();
        assert_eq!(ack.result, CommandResponseType::Accepted);
        assert_eq!(ack.timeout, 30);

        let pending = h
            .repos
            .commands()
            .find_overdue(CommandDirection::RemoteOriginated, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        let uid = pending[0].uid.clone();

        let (outcome, dispatched) = h
            .service
            .on_local_command_set_response(&uid, CommandResultType::Accepted, None)
            .await
            .unwrap();
        assert!(outcome.applied());
        dispatched.join().await;

        let (again, dispatched) = h
            .service
            .on_local_command_set_response(&uid, CommandResultType::Failed, None)
            .await
            .unwrap();
        assert!(!again.applied());
        assert!(dispatched.is_empty());

        let forwarded = h
            .transport
            .requests_to(HttpMethod::Post, "https://p1.example/callback/42");
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].body.as_ref().unwrap()["result"], "ACCEPTED");
    }

    #[tokio::test]
    async fn remote_deadline_reports_timeout() {
        let h = harness(0).await;
        store_local_location(&h).await;
        h.transport
            .respond(HttpMethod::Post, "https://p1.example/callback/42", Value::Null);
        h.service
            .on_remote_command("P1", CommandType::UnlockConnector, remote_request("C1"))
            .await
            .unwrap();

        let sweep = h
            .service
            .remote_commands_deadline_cron_handler(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(sweep.expired.len(), 1);
        sweep.dispatched.join().await;
        let forwarded = h
            .transport
            .requests_to(HttpMethod::Post, "https://p1.example/callback/42");
        assert_eq!(forwarded[0].body.as_ref().unwrap()["result"], "TIMEOUT");
    }

    #[tokio::test]
    async fn reservation_ids_are_scoped_per_platform() {
        let h = harness(30).await;
        h.repos
            .platforms()
            .save(fixtures::connected_platform("P2"))
            .await
            .unwrap();
        store_local_location(&h).await;
        h.repos
            .reservations()
            .save(Reservation::new("R1", "P1", "L1", None, None, Utc::now() + Duration::hours(1)))
            .await
            .unwrap();
        let reserve = |response_url: &str| CommandRequest {
            response_url: response_url.into(),
            location_id: Some("L1".into()),
            evse_uid: Some("E1".into()),
            reservation_id: Some("R1".into()),
            token: Some(token()),
            expiry_date: Some(Utc::now() + Duration::hours(2)),
            ..Default::default()
        };

        let ack = h
            .service
            .on_remote_command("P2", CommandType::ReserveNow, reserve("https://p2.example/callback/7"))
            .await
            .unwrap();
        assert_eq!(ack.result, CommandResponseType::Accepted);

        let ack = h
            .service
            .on_remote_command("P1", CommandType::ReserveNow, reserve("https://p1.example/callback/8"))
            .await
            .unwrap();
        assert_eq!(ack.result, CommandResponseType::Rejected);

        let cancel = CommandRequest {
            response_url: "https://p2.example/callback/9".into(),
            reservation_id: Some("R1".into()),
            ..Default::default()
        };
        let ack = h
            .service
            .on_remote_command("P2", CommandType::CancelReservation, cancel)
            .await
            .unwrap();
        assert_eq!(ack.result, CommandResponseType::Rejected);
    }

    #[tokio::test]
    async fn lapsed_reservations_expire() {
        let h = harness(30).await;
        h.repos
            .reservations()
            .save(Reservation::new("R1", "P1", "L1", None, None, Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(h.service.expire_reservations(Utc::now()).await.unwrap(), 1);
        assert_eq!(h.service.expire_reservations(Utc::now()).await.unwrap(), 0);
        let r = h.repos.reservations().find_by_id("P1", "R1").await.unwrap().unwrap();
        assert_eq!(r.status, ReservationStatus::Expired);
    }
}
