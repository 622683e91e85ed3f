// ── Shared rate-limit gate ──
//
// One gate per remote service connection, shared by every lock talking
// to it. Only the client mutates it (on 429/403 and on success); every
// other holder just reads.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

/// Point-in-time view of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub blocked: bool,
    pub next_attempt_at: DateTime<Utc>,
}

impl GateState {
    fn open() -> Self {
        Self {
            blocked: false,
            next_attempt_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// `true` if a request issued at `now` must be refused locally.
    pub fn blocks_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked && now < self.next_attempt_at
    }
}

/// Cheaply cloneable handle to the shared gate state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<ArcSwap<GateState>>,
    default_backoff: Duration,
}

impl RateLimiter {
    pub fn new(default_backoff: Duration) -> Self {
        Self {
            state: Arc::new(ArcSwap::from_pointee(GateState::open())),
            default_backoff,
        }
    }

    pub fn snapshot(&self) -> GateState {
        **self.state.load()
    }

    pub fn is_blocked(&self) -> bool {
        self.state.load().blocked
    }

    pub fn next_attempt_at(&self) -> DateTime<Utc> {
        self.state.load().next_attempt_at
    }

    /// Backoff applied when the service does not send `Retry-After`.
    pub fn default_backoff(&self) -> Duration {
        self.default_backoff
    }

    /// Block all requests until `until`.
    pub(crate) fn block_until(&self, until: DateTime<Utc>) {
        tracing::warn!(next_attempt_at = %until, "lock service rate limit engaged");
        self.state.store(Arc::new(GateState {
            blocked: true,
            next_attempt_at: until,
        }));
    }

    /// Re-open the gate after a successful request.
    pub(crate) fn clear(&self) {
        if self.is_blocked() {
            tracing::info!("lock service rate limit lifted");
            self.state.store(Arc::new(GateState::open()));
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// `now + secs`, saturating at the latest representable instant.
pub fn deadline_after(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|delay| Utc::now().checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
