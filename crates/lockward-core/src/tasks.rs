// ── Event sources ──
//
// Long-running tasks that feed the `EventBus`: one converts the push
// stream, the other periodically re-reads the lock collection. Both exit
// when their cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use lockward_api::ServiceEvent;

use crate::error::CoreError;
use crate::events::EventBus;
use crate::model::LockEvent;
use crate::service::{LockService, RateLimitGate, ensure_gate_open};

/// Forward push-stream events onto the bus until cancelled or the stream
/// closes. Non-lock events are discarded.
pub async fn pump_service_events(
    mut rx: broadcast::Receiver<Arc<ServiceEvent>>,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => match LockEvent::from_service(&event) {
                    Some(lock_event) => {
                        bus.publish(lock_event);
                    }
                    None => trace!(cid = event.event_cid, "ignoring non-lock event"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event pump lagged behind push stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    debug!("event pump exiting");
}

/// Read the lock collection once and publish a `SensorUpdate` per lock.
/// Returns the number of records published.
pub async fn poll_once(
    service: &dyn LockService,
    gate: &dyn RateLimitGate,
    bus: &EventBus,
) -> Result<usize, CoreError> {
    ensure_gate_open(gate)?;
    let locks = service
        .list_locks()
        .await
        .map_err(|e| CoreError::transport("polling locks", e))?;

    let count = locks.len();
    for lock in locks {
        bus.publish(LockEvent::sensor_update(lock));
    }
    Ok(count)
}

/// Poll every `interval` until cancelled. The first poll happens one
/// interval after start; engines read fresh state on `bind`.
pub async fn poll_locks(
    service: Arc<dyn LockService>,
    gate: Arc<dyn RateLimitGate>,
    bus: Arc<EventBus>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match poll_once(service.as_ref(), gate.as_ref(), &bus).await {
                    Ok(count) => trace!(count, "polled locks"),
                    Err(e @ CoreError::RateLimited { .. }) => debug!(error = %e, "skipping poll"),
                    Err(e) => warn!(error = %e, "lock poll failed"),
                }
            }
        }
    }
    debug!("lock poller exiting");
}
