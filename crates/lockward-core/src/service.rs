// ── Collaborator seams ──
//
// The engine talks to the remote service, the shared rate-limit gate and
// the presentation layer only through these traits. `lockward-api`'s
// concrete client and limiter implement the first two here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lockward_api::{LockClient, RateLimiter};

use crate::error::CoreError;
use crate::model::{
    AccessoryInfo, BatteryStatus, LockCommand, LockCurrentState, LockTargetState, RawLock,
};

/// Remote lock service as the engine needs it.
#[async_trait]
pub trait LockService: Send + Sync {
    async fn list_locks(&self) -> Result<Vec<RawLock>, lockward_api::Error>;

    async fn send_lock_command(
        &self,
        serial: &str,
        command: LockCommand,
    ) -> Result<(), lockward_api::Error>;
}

/// Read-only view of the process-wide rate-limit gate.
pub trait RateLimitGate: Send + Sync {
    fn is_blocked(&self) -> bool;

    fn next_attempt_at(&self) -> DateTime<Utc>;

    /// `true` if a request issued at `now` must not be sent.
    fn blocks_at(&self, now: DateTime<Utc>) -> bool {
        self.is_blocked() && now < self.next_attempt_at()
    }
}

/// Refuse locally while the gate is closed.
pub(crate) fn ensure_gate_open(gate: &dyn RateLimitGate) -> Result<(), CoreError> {
    let now = Utc::now();
    if gate.blocks_at(now) {
        let next_attempt_at = gate.next_attempt_at();
        tracing::debug!(%next_attempt_at, "request refused by rate-limit gate");
        return Err(CoreError::RateLimited { next_attempt_at });
    }
    Ok(())
}

/// Consumer-facing sink. Receives pushes only; the engine never reads
/// back from it.
pub trait PresentationSink: Send + Sync {
    fn update_current_state(&self, state: LockCurrentState);

    fn update_target_state(&self, state: LockTargetState);

    fn update_battery_status(&self, status: BatteryStatus);

    fn update_reachable(&self, _reachable: bool) {}

    fn set_accessory_info(&self, _info: &AccessoryInfo) {}
}

// ── Implementations for the concrete client ──────────────────────────

#[async_trait]
impl LockService for LockClient {
    async fn list_locks(&self) -> Result<Vec<RawLock>, lockward_api::Error> {
        LockClient::list_locks(self).await
    }

    async fn send_lock_command(
        &self,
        serial: &str,
        command: LockCommand,
    ) -> Result<(), lockward_api::Error> {
        self.set_lock_state(serial, command).await
    }
}

impl RateLimitGate for RateLimiter {
    fn is_blocked(&self) -> bool {
        RateLimiter::is_blocked(self)
    }

    fn next_attempt_at(&self) -> DateTime<Utc> {
        RateLimiter::next_attempt_at(self)
    }

    fn blocks_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot().blocks_at(now)
    }
}
