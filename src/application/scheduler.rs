//! Periodic sweeps: reconciliation pulls and command deadlines
//!
//! Each sweep runs in its own tokio task on its own period and stops when
//! the shutdown signal fires. A slow sweep delays only its own next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::commands::CommandService;
use super::sync::Synchronizers;
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// General reconciliation pull over every connected platform
    pub pull_period: Duration,
    /// Pull for platforms that cannot push; must be shorter than `pull_period`
    pub push_unsupported_pull_period: Duration,
    /// How far back each pull looks
    pub pull_window: Duration,
    pub deadline_sweep_period: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            pull_period: Duration::from_secs(900),
            push_unsupported_pull_period: Duration::from_secs(60),
            pull_window: Duration::from_secs(3600),
            deadline_sweep_period: Duration::from_secs(10),
        }
    }
}

pub struct Scheduler {
    synchronizers: Arc<Synchronizers>,
    commands: Arc<CommandService>,
    settings: SchedulerSettings,
    shutdown: ShutdownSignal,
}

impl Scheduler {
    pub fn new(
        synchronizers: Arc<Synchronizers>,
        commands: Arc<CommandService>,
        settings: SchedulerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            synchronizers,
            commands,
            settings,
            shutdown,
        }
    }

    /// Spawn every sweep loop.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        let window = chrono::Duration::from_std(self.settings.pull_window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut handles = Vec::with_capacity(4);

        let sync = self.synchronizers.clone();
        handles.push(spawn_periodic(
            "pull",
            self.settings.pull_period,
            self.shutdown.clone(),
            move || {
                let sync = sync.clone();
                async move {
                    let to = Utc::now();
                    sync.pull_all(Some(to - window), Some(to)).await;
                }
            },
        ));

        let sync = self.synchronizers.clone();
        handles.push(spawn_periodic(
            "push_unsupported_pull",
            self.settings.push_unsupported_pull_period,
            self.shutdown.clone(),
            move || {
                let sync = sync.clone();
                async move {
                    let to = Utc::now();
                    sync.pull_all_push_unsupported(Some(to - window), Some(to)).await;
                }
            },
        ));

        let commands = self.commands.clone();
        handles.push(spawn_periodic(
            "local_command_deadlines",
            self.settings.deadline_sweep_period,
            self.shutdown.clone(),
            move || {
                let commands = commands.clone();
                async move {
                    let now = Utc::now();
                    if let Err(e) = commands.local_commands_deadline_cron_handler(now).await {
                        warn!(error = %e, "Local command deadline sweep failed");
                    }
                    if let Err(e) = commands.expire_reservations(now).await {
                        warn!(error = %e, "Reservation expiry sweep failed");
                    }
                }
            },
        ));

        let commands = self.commands.clone();
        handles.push(spawn_periodic(
            "remote_command_deadlines",
            self.settings.deadline_sweep_period,
            self.shutdown.clone(),
            move || {
                let commands = commands.clone();
                async move {
                    if let Err(e) = commands.remote_commands_deadline_cron_handler(Utc::now()).await {
                        warn!(error = %e, "Remote command deadline sweep failed");
                    }
                }
            },
        ));

        handles
    }
}

/// Run `tick` every `period` until shutdown.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: ShutdownSignal,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(task = name, period_secs = period.as_secs(), "⏱️ Scheduler task started");
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(100)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let stop = shutdown.notified();
            tokio::select! {
                _ = interval.tick() => tick().await,
                _ = stop.wait() => break,
            }
        }

        info!(task = name, "⏱️ Scheduler task stopped");
    })
}
