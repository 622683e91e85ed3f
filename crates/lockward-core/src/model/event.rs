// ── Push-event domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lockward_api::{RawLock, ServiceEvent, ServiceEventKind};

/// Event kinds the bus is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockEventKind {
    Unlocked,
    Locked,
    /// Jam or disabled signal; needs a fresh record to tell which.
    Fault,
    /// Fresh record for one lock from polling.
    SensorUpdate,
}

impl LockEventKind {
    pub const ALL: [Self; 4] = [Self::Unlocked, Self::Locked, Self::Fault, Self::SensorUpdate];
}

impl From<ServiceEventKind> for LockEventKind {
    fn from(kind: ServiceEventKind) -> Self {
        match kind {
            ServiceEventKind::DoorLockUnlocked => Self::Unlocked,
            ServiceEventKind::DoorLockLocked => Self::Locked,
            ServiceEventKind::DoorLockError => Self::Fault,
        }
    }
}

/// One event as seen by engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEvent {
    pub kind: LockEventKind,
    /// Device that raised the event. Events without it match no engine.
    pub sensor_serial: Option<String>,
    /// Only present on `SensorUpdate`.
    pub lock: Option<RawLock>,
    pub received_at: DateTime<Utc>,
}

impl LockEvent {
    pub fn new(kind: LockEventKind, sensor_serial: Option<String>) -> Self {
        Self {
            kind,
            sensor_serial,
            lock: None,
            received_at: Utc::now(),
        }
    }

    pub fn sensor_update(lock: RawLock) -> Self {
        Self {
            kind: LockEventKind::SensorUpdate,
            sensor_serial: Some(lock.serial.clone()),
            lock: Some(lock),
            received_at: Utc::now(),
        }
    }

    /// Convert a raw push event. Returns `None` for non-lock events.
    pub fn from_service(event: &ServiceEvent) -> Option<Self> {
        let kind = event.kind()?;
        Some(Self::new(kind.into(), event.sensor_serial.clone()))
    }
}
