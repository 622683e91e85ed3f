#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use lockward_api::ServiceEvent;
use lockward_core::{
    AccessoryInfo, BatteryStatus, CoreError, EventBus, LockCommand, LockCurrentState, LockEngine,
    LockEvent, LockEventKind, LockService, LockTargetState, PresentationSink, PresentedState,
    RateLimitGate, RawLock, ReadMode, poll_once, pump_service_events,
};

const SERIAL: &str = "lock-1";

// ── Test doubles ────────────────────────────────────────────────────

#[derive(Default)]
struct MockService {
    locks: Mutex<Vec<RawLock>>,
    list_error: Mutex<Option<u16>>,
    command_error: Mutex<Option<u16>>,
    list_delay: Mutex<Option<Duration>>,
    list_calls: AtomicUsize,
    commands: Mutex<Vec<(String, LockCommand)>>,
}

impl MockService {
    fn with_locks(locks: Vec<RawLock>) -> Arc<Self> {
        let service = Self::default();
        *service.locks.lock().unwrap() = locks;
        Arc::new(service)
    }

    fn set_locks(&self, locks: Vec<RawLock>) {
        *self.locks.lock().unwrap() = locks;
    }

    fn fail_list(&self, status: u16) {
        *self.list_error.lock().unwrap() = Some(status);
    }

    fn fail_commands(&self, status: u16) {
        *self.command_error.lock().unwrap() = Some(status);
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn commands(&self) -> Vec<(String, LockCommand)> {
        self.commands.lock().unwrap().clone()
    }
}

fn remote_error(status: u16) -> lockward_api::Error {
    lockward_api::Error::Remote {
        status,
        message: "boom".into(),
    }
}

#[async_trait]
impl LockService for MockService {
    async fn list_locks(&self) -> Result<Vec<RawLock>, lockward_api::Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = *self.list_error.lock().unwrap() {
            return Err(remote_error(status));
        }
        Ok(self.locks.lock().unwrap().clone())
    }

    async fn send_lock_command(
        &self,
        serial: &str,
        command: LockCommand,
    ) -> Result<(), lockward_api::Error> {
        self.commands
            .lock()
            .unwrap()
            .push((serial.to_owned(), command));
        match *self.command_error.lock().unwrap() {
            Some(status) => Err(remote_error(status)),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct MockGate {
    until: Mutex<Option<DateTime<Utc>>>,
}

impl MockGate {
    fn block_for(&self, duration: chrono::Duration) {
        *self.until.lock().unwrap() = Some(Utc::now() + duration);
    }
}

impl RateLimitGate for MockGate {
    fn is_blocked(&self) -> bool {
        self.until.lock().unwrap().is_some()
    }

    fn next_attempt_at(&self) -> DateTime<Utc> {
        self.until.lock().unwrap().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Push {
    Current(LockCurrentState),
    Target(LockTargetState),
    Battery(BatteryStatus),
    Reachable(bool),
    Info(AccessoryInfo),
}

#[derive(Default)]
struct RecordingSink {
    pushes: Mutex<Vec<Push>>,
}

impl RecordingSink {
    fn pushes(&self) -> Vec<Push> {
        self.pushes.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.pushes.lock().unwrap().clear();
    }
}

impl PresentationSink for RecordingSink {
    fn update_current_state(&self, state: LockCurrentState) {
        self.pushes.lock().unwrap().push(Push::Current(state));
    }

    fn update_target_state(&self, state: LockTargetState) {
        self.pushes.lock().unwrap().push(Push::Target(state));
    }

    fn update_battery_status(&self, status: BatteryStatus) {
        self.pushes.lock().unwrap().push(Push::Battery(status));
    }

    fn update_reachable(&self, reachable: bool) {
        self.pushes.lock().unwrap().push(Push::Reachable(reachable));
    }

    fn set_accessory_info(&self, info: &AccessoryInfo) {
        self.pushes.lock().unwrap().push(Push::Info(info.clone()));
    }
}

/// Recording sink that stalls while presenting a jam.
struct SlowJamSink {
    inner: RecordingSink,
    delay: Duration,
}

impl PresentationSink for SlowJamSink {
    fn update_current_state(&self, state: LockCurrentState) {
        if state == LockCurrentState::Jammed {
            std::thread::sleep(self.delay);
        }
        self.inner.update_current_state(state);
    }

    fn update_target_state(&self, state: LockTargetState) {
        self.inner.update_target_state(state);
    }

    fn update_battery_status(&self, status: BatteryStatus) {
        self.inner.update_battery_status(status);
    }

    fn update_reachable(&self, reachable: bool) {
        self.inner.update_reachable(reachable);
    }

    fn set_accessory_info(&self, info: &AccessoryInfo) {
        self.inner.set_accessory_info(info);
    }
}

fn last_current(pushes: &[Push]) -> Option<LockCurrentState> {
    pushes.iter().rev().find_map(|p| match p {
        Push::Current(state) => Some(*state),
        _ => None,
    })
}

// ── Fixtures ────────────────────────────────────────────────────────

fn record(serial: &str, lock_state: i64) -> RawLock {
    serde_json::from_value(json!({
        "serial": serial,
        "name": "Front Door",
        "status": { "lockState": lock_state, "lockJamState": false, "lockDisabled": false },
        "flags": { "offline": false, "lowBattery": false },
    }))
    .unwrap()
}

fn jammed(mut lock: RawLock) -> RawLock {
    lock.status.lock_jam_state = true;
    lock
}

fn disabled(mut lock: RawLock) -> RawLock {
    lock.status.lock_disabled = true;
    lock
}

struct Harness {
    service: Arc<MockService>,
    gate: Arc<MockGate>,
    sink: Arc<RecordingSink>,
    engine: LockEngine,
}

fn harness(locks: Vec<RawLock>) -> Harness {
    let service = MockService::with_locks(locks);
    let gate = Arc::new(MockGate::default());
    let engine = LockEngine::new(
        SERIAL,
        "Front Door",
        Arc::clone(&service) as Arc<dyn LockService>,
        Arc::clone(&gate) as Arc<dyn RateLimitGate>,
    );
    Harness {
        service,
        gate,
        sink: Arc::new(RecordingSink::default()),
        engine,
    }
}

async fn bound(locks: Vec<RawLock>) -> Harness {
    let h = harness(locks);
    h.engine
        .bind(Arc::clone(&h.sink) as Arc<dyn PresentationSink>)
        .await
        .unwrap();
    h.sink.clear();
    h
}

fn event(kind: LockEventKind, serial: &str) -> LockEvent {
    LockEvent::new(kind, Some(serial.to_owned()))
}

// ── Binding ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bind_publishes_accessory_info_then_refreshed_state() {
    let mut lock = record(SERIAL, 1);
    lock.flags.as_mut().unwrap().low_battery = true;
    let h = harness(vec![record("other", 0), lock]);

    let state = h
        .engine
        .bind(Arc::clone(&h.sink) as Arc<dyn PresentationSink>)
        .await
        .unwrap();

    let expected = PresentedState {
        current: LockCurrentState::Secured,
        target: LockTargetState::Secured,
        battery: BatteryStatus::Low,
        reachable: true,
    };
    assert_eq!(state, expected);
    assert_eq!(h.engine.presented(), expected);
    assert!(h.engine.is_linked());
    assert_eq!(
        h.sink.pushes(),
        vec![
            Push::Info(AccessoryInfo::smart_lock(SERIAL, "Front Door")),
            Push::Target(LockTargetState::Secured),
            Push::Current(LockCurrentState::Secured),
            Push::Battery(BatteryStatus::Low),
            Push::Reachable(true),
        ]
    );
}

#[tokio::test]
async fn bind_keeps_link_when_initial_refresh_fails() {
    let h = harness(vec![record(SERIAL, 1)]);
    h.service.fail_list(500);

    let err = h
        .engine
        .bind(Arc::clone(&h.sink) as Arc<dyn PresentationSink>)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Transport { .. }));
    assert!(h.engine.is_linked());
    assert_eq!(h.engine.presented(), PresentedState::default());
}

#[tokio::test]
async fn reads_before_bind_return_defaults_without_network() {
    let h = harness(vec![record(SERIAL, 0)]);

    assert_eq!(h.engine.read_current_state(), LockCurrentState::Unknown);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(
        h.engine.current_state(ReadMode::Cached).await.unwrap(),
        LockCurrentState::Unknown
    );
    assert_eq!(h.service.list_calls(), 0);
}

#[tokio::test]
async fn refresh_and_write_before_bind_are_refused() {
    let h = harness(vec![record(SERIAL, 0)]);

    assert!(matches!(
        h.engine.refresh().await,
        Err(CoreError::NotLinked { .. })
    ));
    assert!(matches!(
        h.engine.write_target_state(LockTargetState::Secured).await,
        Err(CoreError::NotLinked { .. })
    ));
    assert_eq!(h.service.list_calls(), 0);
    assert!(h.service.commands().is_empty());
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_maps_jam_and_disabled_faults() {
    let h = bound(vec![jammed(record(SERIAL, 1))]).await;
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Jammed);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);

    h.service.set_locks(vec![disabled(jammed(record(SERIAL, 0)))]);
    h.engine.refresh().await.unwrap();
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Unknown);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Unsecured);
}

#[tokio::test]
async fn refresh_treats_code_two_as_unlocked() {
    let h = bound(vec![record(SERIAL, 2)]).await;
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Unsecured);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Unsecured);
}

#[tokio::test]
async fn refresh_with_unknown_code_commits_nothing() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![record(SERIAL, 7)]);

    let err = h.engine.refresh().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::UnmappedLockState { code: 7, .. }
    ));
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert!(h.sink.pushes().is_empty());
}

#[tokio::test]
async fn refresh_reports_missing_lock() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![record("someone-else", 0)]);

    let err = h.engine.refresh().await.unwrap_err();

    assert!(matches!(err, CoreError::LockNotFound { ref serial } if serial == SERIAL));
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
}

#[tokio::test]
async fn transport_error_carries_context() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.fail_list(503);

    let err = h.engine.refresh().await.unwrap_err();

    assert!(err.to_string().contains("getting lock"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_record_only_fails_its_own_lock() {
    let broken: RawLock =
        serde_json::from_value(json!({ "serial": "lock-2", "status": "??" })).unwrap();
    let h = bound(vec![broken.clone(), record(SERIAL, 1)]).await;
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);

    let other = LockEngine::for_lock(
        &broken,
        Arc::clone(&h.service) as Arc<dyn LockService>,
        Arc::clone(&h.gate) as Arc<dyn RateLimitGate>,
    );
    let err = other
        .bind(Arc::new(RecordingSink::default()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::UnmappedLockState { ref serial, code }
            if serial == "lock-2" && code == lockward_api::UNKNOWN_LOCK_STATE
    ));
    assert_eq!(other.presented(), PresentedState::default());
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_reads_never_touch_the_network() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    let calls = h.service.list_calls();

    for _ in 0..5 {
        h.engine.read_current_state();
        h.engine.target_state(ReadMode::Cached).await.unwrap();
    }

    assert_eq!(h.service.list_calls(), calls);
}

#[tokio::test]
async fn forced_read_commits_only_the_read_field() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![jammed(record(SERIAL, 0))]);

    let current = h.engine.current_state(ReadMode::Forced).await.unwrap();

    assert_eq!(current, LockCurrentState::Jammed);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(h.sink.pushes(), vec![Push::Current(LockCurrentState::Jammed)]);

    h.sink.clear();
    let target = h.engine.target_state(ReadMode::Forced).await.unwrap();
    assert_eq!(target, LockTargetState::Unsecured);
    assert_eq!(h.sink.pushes(), vec![Push::Target(LockTargetState::Unsecured)]);
}

// ── Rate-limit gate ─────────────────────────────────────────────────

#[tokio::test]
async fn closed_gate_blocks_every_remote_operation() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    let calls = h.service.list_calls();
    h.gate.block_for(chrono::Duration::minutes(5));

    assert!(matches!(
        h.engine.refresh().await,
        Err(CoreError::RateLimited { .. })
    ));
    assert!(matches!(
        h.engine.current_state(ReadMode::Forced).await,
        Err(CoreError::RateLimited { .. })
    ));
    assert!(matches!(
        h.engine.write_target_state(LockTargetState::Unsecured).await,
        Err(CoreError::RateLimited { .. })
    ));
    assert!(!h.engine.update_reachability().await);

    assert_eq!(h.service.list_calls(), calls);
    assert!(h.service.commands().is_empty());
    // Cached reads still answer.
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert!(h.engine.presented().reachable);
}

#[tokio::test]
async fn expired_block_lets_requests_through() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.gate.block_for(chrono::Duration::seconds(-1));

    h.engine.refresh().await.unwrap();
}

// ── Write path ──────────────────────────────────────────────────────

#[tokio::test]
async fn write_sends_command_and_commits_target_only() {
    let h = bound(vec![record(SERIAL, 0)]).await;

    h.engine
        .write_target_state(LockTargetState::Secured)
        .await
        .unwrap();

    assert_eq!(
        h.service.commands(),
        vec![(SERIAL.to_owned(), LockCommand::Lock)]
    );
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Unsecured);
    assert_eq!(h.sink.pushes(), vec![Push::Target(LockTargetState::Secured)]);
}

#[tokio::test]
async fn failed_write_leaves_target_untouched() {
    let h = bound(vec![record(SERIAL, 0)]).await;
    h.service.fail_commands(500);

    let err = h
        .engine
        .write_target_state(LockTargetState::Secured)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("setting the target door lock state"));
    assert_eq!(h.engine.read_target_state(), LockTargetState::Unsecured);
    assert!(h.sink.pushes().is_empty());
}

#[tokio::test]
async fn unsecured_write_sends_unlock() {
    let h = bound(vec![record(SERIAL, 1)]).await;

    h.engine
        .write_target_state(LockTargetState::Unsecured)
        .await
        .unwrap();

    assert_eq!(
        h.service.commands(),
        vec![(SERIAL.to_owned(), LockCommand::Unlock)]
    );
    assert_eq!(h.engine.read_target_state(), LockTargetState::Unsecured);
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
}

#[tokio::test]
async fn written_target_reads_back_without_network() {
    let h = bound(vec![record(SERIAL, 0)]).await;
    let calls = h.service.list_calls();

    h.engine
        .write_target_state(LockTargetState::Secured)
        .await
        .unwrap();

    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(
        h.engine.target_state(ReadMode::Cached).await.unwrap(),
        LockTargetState::Secured
    );
    assert_eq!(h.service.list_calls(), calls);
}

#[tokio::test]
async fn write_then_locked_event_settles_without_contradiction() {
    let h = bound(vec![record(SERIAL, 0)]).await;
    let mut stream = h.engine.subscribe();

    h.engine
        .write_target_state(LockTargetState::Secured)
        .await
        .unwrap();
    let pending = stream.changed().await.unwrap();

    h.engine
        .handle_event(&event(LockEventKind::Locked, SERIAL))
        .await;
    let settled = stream.changed().await.unwrap();

    assert_eq!(pending.current, LockCurrentState::Unsecured);
    assert_eq!(pending.target, LockTargetState::Secured);
    assert_eq!(settled.current, LockCurrentState::Secured);
    assert_eq!(settled.target, LockTargetState::Secured);
    assert_eq!(
        h.sink.pushes(),
        vec![
            Push::Target(LockTargetState::Secured),
            Push::Target(LockTargetState::Secured),
            Push::Current(LockCurrentState::Secured),
        ]
    );
}

// ── Reachability ────────────────────────────────────────────────────

#[tokio::test]
async fn reachability_follows_offline_flag_and_presence() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    assert!(h.engine.presented().reachable);

    let mut offline = record(SERIAL, 1);
    offline.flags.as_mut().unwrap().offline = true;
    h.service.set_locks(vec![offline]);
    assert!(!h.engine.update_reachability().await);
    assert!(!h.engine.presented().reachable);

    h.service.set_locks(vec![record(SERIAL, 1)]);
    assert!(h.engine.update_reachability().await);

    h.service.set_locks(vec![]);
    assert!(!h.engine.update_reachability().await);
    assert!(!h.engine.presented().reachable);
}

#[tokio::test]
async fn reachability_error_does_not_commit() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.fail_list(500);

    assert!(!h.engine.update_reachability().await);
    assert!(h.engine.presented().reachable);
    assert!(h.sink.pushes().is_empty());
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn locked_event_settles_both_states_at_once() {
    let h = bound(vec![record(SERIAL, 0)]).await;
    let mut stream = h.engine.subscribe();

    h.engine
        .handle_event(&event(LockEventKind::Locked, SERIAL))
        .await;

    let state = stream.changed().await.unwrap();
    assert_eq!(state.current, LockCurrentState::Secured);
    assert_eq!(state.target, LockTargetState::Secured);
    assert_eq!(
        h.sink.pushes(),
        vec![
            Push::Target(LockTargetState::Secured),
            Push::Current(LockCurrentState::Secured),
        ]
    );
}

#[tokio::test]
async fn events_for_other_locks_or_before_bind_are_ignored() {
    let h = harness(vec![record(SERIAL, 1)]);
    h.engine
        .handle_event(&event(LockEventKind::Unlocked, SERIAL))
        .await;
    assert_eq!(h.engine.presented(), PresentedState::default());

    let h = bound(vec![record(SERIAL, 1)]).await;
    h.engine
        .handle_event(&event(LockEventKind::Unlocked, "lock-2"))
        .await;
    h.engine
        .handle_event(&LockEvent::new(LockEventKind::Unlocked, None))
        .await;
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert!(h.sink.pushes().is_empty());
}

#[tokio::test]
async fn fault_event_reads_record_and_overlays_current() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![jammed(record(SERIAL, 1))]);

    h.engine
        .handle_event(&event(LockEventKind::Fault, SERIAL))
        .await;

    assert_eq!(h.engine.read_current_state(), LockCurrentState::Jammed);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(h.sink.pushes(), vec![Push::Current(LockCurrentState::Jammed)]);
}

#[tokio::test]
async fn fault_event_on_disabled_lock_reads_once_and_reports_unknown() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![disabled(record(SERIAL, 1))]);
    let calls = h.service.list_calls();

    h.engine
        .handle_event(&event(LockEventKind::Fault, SERIAL))
        .await;

    assert_eq!(h.service.list_calls(), calls + 1);
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Unknown);
    assert_eq!(h.engine.read_target_state(), LockTargetState::Secured);
    assert_eq!(h.sink.pushes(), vec![Push::Current(LockCurrentState::Unknown)]);
}

#[tokio::test]
async fn fault_event_without_flags_or_with_failed_lookup_changes_nothing() {
    let h = bound(vec![record(SERIAL, 1)]).await;

    h.engine
        .handle_event(&event(LockEventKind::Fault, SERIAL))
        .await;
    h.service.fail_list(500);
    h.engine
        .handle_event(&event(LockEventKind::Fault, SERIAL))
        .await;

    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert!(h.sink.pushes().is_empty());
}

#[tokio::test]
async fn sensor_update_refreshes_battery_only() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    let mut lock = record(SERIAL, 0);
    lock.flags.as_mut().unwrap().low_battery = true;

    h.engine.handle_event(&LockEvent::sensor_update(lock)).await;

    assert_eq!(h.engine.presented().battery, BatteryStatus::Low);
    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert_eq!(h.sink.pushes(), vec![Push::Battery(BatteryStatus::Low)]);
}

// ── Listener wiring ─────────────────────────────────────────────────

#[tokio::test]
async fn listener_applies_bus_events_for_its_serial() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    let bus = Arc::new(EventBus::new());
    let cancel = CancellationToken::new();
    let task = h.engine.listen(&bus, cancel.clone());
    let mut stream = h.engine.subscribe();

    assert_eq!(bus.handler_count(LockEventKind::Unlocked), 1);
    assert_eq!(bus.publish(event(LockEventKind::Unlocked, "lock-2")), 0);
    assert_eq!(bus.publish(event(LockEventKind::Unlocked, SERIAL)), 1);

    let state = tokio::time::timeout(Duration::from_secs(1), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.current, LockCurrentState::Unsecured);

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(bus.handler_count(LockEventKind::Unlocked), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_fault_lookup_lands_after_later_event() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    h.service.set_locks(vec![jammed(record(SERIAL, 1))]);
    *h.service.list_delay.lock().unwrap() = Some(Duration::from_millis(100));

    let bus = Arc::new(EventBus::new());
    let cancel = CancellationToken::new();
    let _task = h.engine.listen(&bus, cancel.clone());
    let mut stream = h.engine.subscribe();

    bus.publish(event(LockEventKind::Fault, SERIAL));
    bus.publish(event(LockEventKind::Unlocked, SERIAL));

    let first = stream.changed().await.unwrap();
    assert_eq!(first.current, LockCurrentState::Unsecured);
    assert_eq!(first.target, LockTargetState::Unsecured);

    let second = stream.changed().await.unwrap();
    assert_eq!(second.current, LockCurrentState::Jammed);
    assert_eq!(second.target, LockTargetState::Unsecured);

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_commits_reach_the_sink_in_cache_order() {
    let h = harness(vec![record(SERIAL, 0)]);
    let sink = Arc::new(SlowJamSink {
        inner: RecordingSink::default(),
        delay: Duration::from_millis(300),
    });
    h.engine
        .bind(Arc::clone(&sink) as Arc<dyn PresentationSink>)
        .await
        .unwrap();
    h.service.set_locks(vec![jammed(record(SERIAL, 0))]);

    let engine = h.engine.clone();
    let fault = tokio::spawn(async move {
        engine
            .handle_event(&event(LockEventKind::Fault, SERIAL))
            .await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.engine
        .handle_event(&event(LockEventKind::Locked, SERIAL))
        .await;
    fault.await.unwrap();

    assert_eq!(h.engine.read_current_state(), LockCurrentState::Secured);
    assert_eq!(
        last_current(&sink.inner.pushes()),
        Some(h.engine.read_current_state())
    );
}

#[tokio::test]
async fn poll_feeds_battery_updates_through_the_bus() {
    let h = bound(vec![record(SERIAL, 1)]).await;
    let bus = Arc::new(EventBus::new());
    let cancel = CancellationToken::new();
    let _task = h.engine.listen(&bus, cancel.clone());
    let mut stream = h.engine.subscribe();

    let mut lock = record(SERIAL, 1);
    lock.flags.as_mut().unwrap().low_battery = true;
    h.service.set_locks(vec![lock, record("lock-2", 0)]);

    let published = poll_once(h.service.as_ref(), h.gate.as_ref(), &bus)
        .await
        .unwrap();
    assert_eq!(published, 2);

    let state = tokio::time::timeout(Duration::from_secs(1), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.battery, BatteryStatus::Low);

    h.gate.block_for(chrono::Duration::minutes(1));
    assert!(matches!(
        poll_once(h.service.as_ref(), h.gate.as_ref(), &bus).await,
        Err(CoreError::RateLimited { .. })
    ));
    cancel.cancel();
}

#[tokio::test]
async fn pump_converts_service_events_and_drops_others() {
    let h = bound(vec![record(SERIAL, 0)]).await;
    let bus = Arc::new(EventBus::new());
    let cancel = CancellationToken::new();
    let _listener = h.engine.listen(&bus, cancel.clone());
    let mut stream = h.engine.subscribe();

    let (tx, rx) = broadcast::channel(8);
    let pump = tokio::spawn(pump_service_events(rx, Arc::clone(&bus), cancel.clone()));

    let unrelated: ServiceEvent =
        serde_json::from_value(json!({ "eventCid": 1400, "sensorSerial": SERIAL })).unwrap();
    let locked: ServiceEvent =
        serde_json::from_value(json!({ "eventCid": 9701, "sensorSerial": SERIAL })).unwrap();
    tx.send(Arc::new(unrelated)).unwrap();
    tx.send(Arc::new(locked)).unwrap();

    let state = tokio::time::timeout(Duration::from_secs(1), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.current, LockCurrentState::Secured);

    drop(tx);
    pump.await.unwrap();
    cancel.cancel();
}
