//! Fire-and-forget outbound dispatch
//!
//! Each target platform gets its own task, so one slow or failing
//! counterpart never delays delivery to another. Failures go to a
//! caller-supplied [`ErrorHandler`]; nothing is retried here.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument};

use crate::application::events::{DispatchFailedEvent, Event, SharedEventBus};
use crate::domain::module::ModuleId;
use crate::shared::errors::DomainError;

/// A dispatch that did not reach its target
#[derive(Debug)]
pub struct DispatchFailure {
    pub platform_id: String,
    pub module: ModuleId,
    /// Entity id or command uid
    pub entity_id: String,
    pub error: DomainError,
}

pub type ErrorHandler = Arc<dyn Fn(DispatchFailure) + Send + Sync>;

/// Handler that logs the failure and publishes `DispatchFailed`
pub fn default_error_handler(event_bus: Option<SharedEventBus>) -> ErrorHandler {
    Arc::new(move |failure: DispatchFailure| {
        warn!(
            platform_id = %failure.platform_id,
            module = %failure.module,
            entity_id = %failure.entity_id,
            error = %failure.error,
            "Outbound dispatch failed"
        );
        if let Some(bus) = &event_bus {
            bus.publish(Event::DispatchFailed(DispatchFailedEvent {
                platform_id: failure.platform_id,
                module: failure.module.to_string(),
                entity_id: failure.entity_id,
                error: failure.error.to_string(),
                timestamp: Utc::now(),
            }));
        }
    })
}

/// Handles of the tasks spawned for one triggering event.
///
/// Dropping it detaches the tasks; `join` is for callers (mostly tests)
/// that want to wait for delivery.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub platform_ids: Vec<String>,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatched {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.platform_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platform_ids.is_empty()
    }

    /// Spawn `fut` for `platform_id`; an `Err` is routed to `on_error`.
    pub fn spawn<F>(
        &mut self,
        platform_id: &str,
        module: ModuleId,
        entity_id: &str,
        on_error: ErrorHandler,
        fut: F,
    ) where
        F: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let span = tracing::debug_span!("dispatch", platform_id, module = %module, entity_id);
        let platform = platform_id.to_string();
        let entity = entity_id.to_string();
        let handle = tokio::spawn(
            async move {
                if let Err(error) = fut.await {
                    on_error(DispatchFailure {
                        platform_id: platform,
                        module,
                        entity_id: entity,
                        error,
                    });
                }
            }
            .instrument(span),
        );
        self.platform_ids.push(platform_id.to_string());
        self.handles.push(handle);
    }

    /// Take over the tasks of another dispatch
    pub fn extend(&mut self, other: Dispatched) {
        self.platform_ids.extend(other.platform_ids);
        self.handles.extend(other.handles);
    }

    /// Wait for every spawned dispatch to finish
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Dispatch task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::shared::errors::TransportError;

    #[tokio::test]
    async fn failures_reach_the_handler_independently() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: ErrorHandler = Arc::new(move |f: DispatchFailure| {
            sink.lock().unwrap().push(f.platform_id);
        });

        let mut dispatched = Dispatched::new();
        dispatched.spawn("P1", ModuleId::Locations, "L1", handler.clone(), async {
            Err(TransportError::EmptyResponse("http://p1".into()).into())
        });
        dispatched.spawn("P2", ModuleId::Locations, "L1", handler, async { Ok(()) });
        assert_eq!(dispatched.len(), 2);
        dispatched.join().await;

        assert_eq!(*seen.lock().unwrap(), vec!["P1".to_string()]);
    }
}
