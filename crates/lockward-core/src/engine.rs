// ── Lock reconciliation engine ──
//
// One engine per physical lock. Owns the presented-state cache, commits
// mapped remote state into it, pushes every commit to the bound
// presentation sink, and reacts to push events scoped to its serial.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::events::{EventBus, EventFilter, RegistrationId};
use crate::mapper::{self, MappingError};
use crate::model::{
    AccessoryInfo, BatteryStatus, LockCurrentState, LockEvent, LockEventKind, LockTargetState,
    PresentedState, RawLock,
};
use crate::service::{LockService, PresentationSink, RateLimitGate, ensure_gate_open};
use crate::stream::PresentedStateStream;

/// Whether a read may go to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Answer from the owned cache, never touching the network.
    #[default]
    Cached,
    /// Fetch the lock record and commit what was read.
    Forced,
}

/// Find the record for `serial` in a lock listing.
pub fn find_lock(
    locks: impl IntoIterator<Item = RawLock>,
    serial: &str,
) -> Result<RawLock, CoreError> {
    locks
        .into_iter()
        .find(|l| l.serial == serial)
        .ok_or_else(|| CoreError::LockNotFound {
            serial: serial.to_owned(),
        })
}

// ── Commit ───────────────────────────────────────────────────────

/// Fields to replace in one atomic commit. `None` leaves a field alone.
#[derive(Debug, Clone, Copy, Default)]
struct Commit {
    current: Option<LockCurrentState>,
    target: Option<LockTargetState>,
    battery: Option<BatteryStatus>,
    reachable: Option<bool>,
}

impl Commit {
    fn all(state: PresentedState) -> Self {
        Self {
            current: Some(state.current),
            target: Some(state.target),
            battery: Some(state.battery),
            reachable: Some(state.reachable),
        }
    }

    /// Current and target both settled on the same side.
    fn settled(target: LockTargetState) -> Self {
        Self {
            current: Some(target.into()),
            target: Some(target),
            ..Self::default()
        }
    }
}

// ── LockEngine ───────────────────────────────────────────────────

/// Reconciliation engine for a single lock.
///
/// Cheaply cloneable via `Arc<EngineInner>`; clones share the cache and
/// the presentation link.
#[derive(Clone)]
pub struct LockEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    serial: String,
    name: String,
    service: Arc<dyn LockService>,
    gate: Arc<dyn RateLimitGate>,
    state: watch::Sender<PresentedState>,
    sink: RwLock<Option<Arc<dyn PresentationSink>>>,
    /// Held across the cache update and the sink pushes of one commit.
    commit_lock: Mutex<()>,
}

impl LockEngine {
    pub fn new(
        serial: impl Into<String>,
        name: impl Into<String>,
        service: Arc<dyn LockService>,
        gate: Arc<dyn RateLimitGate>,
    ) -> Self {
        let (state, _) = watch::channel(PresentedState::default());
        Self {
            inner: Arc::new(EngineInner {
                serial: serial.into(),
                name: name.into(),
                service,
                gate,
                state,
                sink: RwLock::new(None),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Create an engine for a record returned by the service.
    pub fn for_lock(
        lock: &RawLock,
        service: Arc<dyn LockService>,
        gate: Arc<dyn RateLimitGate>,
    ) -> Self {
        let name = lock
            .name
            .clone()
            .unwrap_or_else(|| format!("Smart Lock {}", lock.serial));
        Self::new(lock.serial.clone(), name, service, gate)
    }

    pub fn serial(&self) -> &str {
        &self.inner.serial
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn accessory_info(&self) -> AccessoryInfo {
        AccessoryInfo::smart_lock(self.serial(), self.name())
    }

    // ── Presentation link ────────────────────────────────────────

    /// Link to a live presentation sink and run the initial forced refresh.
    ///
    /// The link holds even when the refresh fails; the error is returned
    /// and the sink keeps its previous values.
    pub async fn bind(&self, sink: Arc<dyn PresentationSink>) -> Result<PresentedState, CoreError> {
        sink.set_accessory_info(&self.accessory_info());
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
        debug!(serial = %self.serial(), "linked to presentation service");

        self.refresh().await
    }

    pub fn is_linked(&self) -> bool {
        self.sink().is_some()
    }

    /// Acknowledge an identify request.
    pub fn identify(&self) {
        debug!(serial = %self.serial(), name = %self.name(), "identify request");
    }

    // ── Cached reads ─────────────────────────────────────────────

    pub fn presented(&self) -> PresentedState {
        *self.inner.state.borrow()
    }

    pub fn read_current_state(&self) -> LockCurrentState {
        self.presented().current
    }

    pub fn read_target_state(&self) -> LockTargetState {
        self.presented().target
    }

    pub fn subscribe(&self) -> PresentedStateStream {
        PresentedStateStream::new(self.inner.state.subscribe())
    }

    // ── Refresh coordinator ──────────────────────────────────────

    /// Fetch this lock's record from the service.
    pub async fn lookup(&self) -> Result<RawLock, CoreError> {
        ensure_gate_open(self.inner.gate.as_ref())?;
        let locks = self
            .inner
            .service
            .list_locks()
            .await
            .map_err(|e| CoreError::transport("getting lock", e))?;
        find_lock(locks, self.serial())
    }

    /// Authoritative refresh: lookup, map, and commit all four fields.
    /// Nothing is committed on failure.
    pub async fn refresh(&self) -> Result<PresentedState, CoreError> {
        self.ensure_linked()?;
        debug!(serial = %self.serial(), "refreshing door lock state");

        let lock = self.lookup().await?;
        let state = self.map(&lock)?;
        self.commit(Commit::all(state));

        debug!(
            serial = %self.serial(),
            lock_state = lock.status.lock_state,
            current = %state.current,
            target = %state.target,
            "door lock state refreshed"
        );
        Ok(state)
    }

    pub async fn current_state(&self, mode: ReadMode) -> Result<LockCurrentState, CoreError> {
        match mode {
            ReadMode::Cached => Ok(self.read_current_state()),
            ReadMode::Forced => {
                let lock = self.lookup().await?;
                let current = self.map(&lock)?.current;
                debug!(serial = %self.serial(), lock_state = lock.status.lock_state, %current, "current lock state");
                self.commit(Commit {
                    current: Some(current),
                    ..Commit::default()
                });
                Ok(current)
            }
        }
    }

    pub async fn target_state(&self, mode: ReadMode) -> Result<LockTargetState, CoreError> {
        match mode {
            ReadMode::Cached => Ok(self.read_target_state()),
            ReadMode::Forced => {
                let lock = self.lookup().await?;
                let target = self.map(&lock)?.target;
                debug!(serial = %self.serial(), lock_state = lock.status.lock_state, %target, "target lock state");
                self.commit(Commit {
                    target: Some(target),
                    ..Commit::default()
                });
                Ok(target)
            }
        }
    }

    /// Re-derive reachability from a fresh record.
    ///
    /// A missing record resolves to `false` and is committed; any other
    /// failure is logged and resolves to `false` without touching the cache.
    pub async fn update_reachability(&self) -> bool {
        let reachable = match self.lookup().await {
            Ok(lock) => mapper::reachability(Some(&lock)),
            Err(CoreError::LockNotFound { .. }) => mapper::reachability(None),
            Err(e) => {
                error!(serial = %self.serial(), error = %e, "failed to update reachability");
                return false;
            }
        };

        self.commit(Commit {
            reachable: Some(reachable),
            ..Commit::default()
        });
        reachable
    }

    // ── Target-state write path ──────────────────────────────────

    /// Send the lock/unlock command; on success commit the requested target.
    ///
    /// The current state is left for the push event or the next refresh
    /// to settle, since the physical action completes asynchronously.
    pub async fn write_target_state(&self, target: LockTargetState) -> Result<(), CoreError> {
        let command = target.command();
        debug!(serial = %self.serial(), %command, %target, "setting target lock state");

        self.ensure_linked()?;
        ensure_gate_open(self.inner.gate.as_ref())?;

        self.inner
            .service
            .send_lock_command(self.serial(), command)
            .await
            .map_err(|e| CoreError::transport("setting the target door lock state", e))?;

        debug!(serial = %self.serial(), %command, "lock command accepted");
        self.commit(Commit {
            target: Some(target),
            ..Commit::default()
        });
        Ok(())
    }

    // ── Event listener ───────────────────────────────────────────

    /// Apply one push event. Events for other locks, or arriving before
    /// `bind`, are dropped.
    pub async fn handle_event(&self, event: &LockEvent) {
        if !self.accepts(event) {
            return;
        }
        debug!(serial = %self.serial(), kind = ?event.kind, "lock received event");

        match event.kind {
            LockEventKind::Unlocked => self.commit(Commit::settled(LockTargetState::Unsecured)),
            LockEventKind::Locked => self.commit(Commit::settled(LockTargetState::Secured)),
            LockEventKind::Fault => self.apply_fault().await,
            LockEventKind::SensorUpdate => {
                if let Some(lock) = &event.lock {
                    self.commit(Commit {
                        battery: Some(mapper::battery_status(lock.flags.as_ref())),
                        ..Commit::default()
                    });
                }
            }
        }
    }

    /// Register this engine on the bus and spawn its listener task.
    ///
    /// Events are applied in receipt order. Fault lookups run detached, so
    /// a later locked/unlocked event may land before the lookup completes
    /// and then be overwritten by it.
    pub fn listen(&self, bus: &Arc<EventBus>, cancel: CancellationToken) -> JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel();

        let ids: Vec<RegistrationId> = LockEventKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                bus.register(kind, EventFilter::Device(self.serial().to_owned()), move |event| {
                    let _ = tx.send(event);
                })
            })
            .collect();

        tokio::spawn(listener_task(self.clone(), Arc::clone(bus), ids, rx, cancel))
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn sink(&self) -> Option<Arc<dyn PresentationSink>> {
        self.inner
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_linked(&self) -> Result<(), CoreError> {
        if self.is_linked() {
            Ok(())
        } else {
            Err(CoreError::NotLinked {
                serial: self.serial().to_owned(),
            })
        }
    }

    fn accepts(&self, event: &LockEvent) -> bool {
        let valid = self.is_linked() && event.sensor_serial.as_deref() == Some(self.serial());
        if !valid {
            debug!(serial = %self.serial(), kind = ?event.kind, from = ?event.sensor_serial, "ignoring event");
        }
        valid
    }

    fn map(&self, lock: &RawLock) -> Result<PresentedState, CoreError> {
        mapper::map_state(lock).map_err(|e| match e {
            MappingError::UnknownLockState { code } => CoreError::UnmappedLockState {
                serial: self.serial().to_owned(),
                code,
            },
        })
    }

    async fn apply_fault(&self) {
        match self.lookup().await {
            Ok(lock) => match mapper::fault_overlay(&lock.status) {
                Some(current) => {
                    info!(serial = %self.serial(), %current, "lock reported a fault");
                    self.commit(Commit {
                        current: Some(current),
                        ..Commit::default()
                    });
                }
                None => debug!(serial = %self.serial(), "fault event without fault flags on record"),
            },
            Err(e) => {
                error!(serial = %self.serial(), error = %e, "failed to update lock error state");
            }
        }
    }

    /// Replace the given fields in the cache, then push them to the sink.
    ///
    /// Commits are serialized end to end, so the sink always sees them in
    /// the order the cache applied them.
    fn commit(&self, commit: Commit) {
        let _guard = self
            .inner
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.inner.state.send_if_modified(|state| {
            let before = *state;
            if let Some(current) = commit.current {
                state.current = current;
            }
            if let Some(target) = commit.target {
                state.target = target;
            }
            if let Some(battery) = commit.battery {
                state.battery = battery;
            }
            if let Some(reachable) = commit.reachable {
                state.reachable = reachable;
            }
            before != *state
        });

        let Some(sink) = self.sink() else { return };
        if let Some(target) = commit.target {
            sink.update_target_state(target);
        }
        if let Some(current) = commit.current {
            sink.update_current_state(current);
        }
        if let Some(battery) = commit.battery {
            sink.update_battery_status(battery);
        }
        if let Some(reachable) = commit.reachable {
            sink.update_reachable(reachable);
        }
    }
}

impl std::fmt::Debug for LockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockEngine")
            .field("serial", &self.inner.serial)
            .field("name", &self.inner.name)
            .field("state", &self.presented())
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn listener_task(
    engine: LockEngine,
    bus: Arc<EventBus>,
    registrations: Vec<RegistrationId>,
    mut rx: mpsc::UnboundedReceiver<Arc<LockEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                if event.kind == LockEventKind::Fault {
                    let engine = engine.clone();
                    tokio::spawn(async move { engine.handle_event(&event).await });
                } else {
                    engine.handle_event(&event).await;
                }
            }
        }
    }

    for id in registrations {
        bus.unregister(id);
    }
    if !cancel.is_cancelled() {
        warn!(serial = %engine.serial(), "event listener stopped unexpectedly");
    }
    debug!(serial = %engine.serial(), "event listener exiting");
}
