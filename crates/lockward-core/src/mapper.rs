// ── Raw record to presented state ──
//
// Pure mapping from the service's lock record to the two-axis presented
// state. Fault flags only ever touch the current state: disabled wins
// over jam, jam wins over the raw lock code. No I/O.

use thiserror::Error;

use crate::model::{
    BatteryStatus, LockCurrentState, LockFlags, LockStatus, LockTargetState, PresentedState,
    RawLock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("unrecognized lock state code {code}")]
    UnknownLockState { code: i64 },
}

/// Base mapping of the raw `lockState` code, before fault overlays.
///
/// Known codes: 0 = unlocked, 1 = locked, 2 = unlocked.
pub fn base_states(code: i64) -> Result<(LockCurrentState, LockTargetState), MappingError> {
    match code {
        0 | 2 => Ok((LockCurrentState::Unsecured, LockTargetState::Unsecured)),
        1 => Ok((LockCurrentState::Secured, LockTargetState::Secured)),
        _ => Err(MappingError::UnknownLockState { code }),
    }
}

/// Current-state override from the fault flags, if any applies.
pub fn fault_overlay(status: &LockStatus) -> Option<LockCurrentState> {
    if status.lock_disabled {
        Some(LockCurrentState::Unknown)
    } else if status.lock_jam_state {
        Some(LockCurrentState::Jammed)
    } else {
        None
    }
}

pub fn battery_status(flags: Option<&LockFlags>) -> BatteryStatus {
    match flags {
        Some(f) if f.low_battery => BatteryStatus::Low,
        _ => BatteryStatus::Normal,
    }
}

/// Record exists, carries flags, and is not flagged offline.
pub fn reachability(lock: Option<&RawLock>) -> bool {
    lock.and_then(|l| l.flags.as_ref())
        .is_some_and(|flags| !flags.offline)
}

/// Map a full lock record.
///
/// Fails only for `lockState` codes outside the known table; the caller
/// must then leave its presented state untouched.
pub fn map_state(lock: &RawLock) -> Result<PresentedState, MappingError> {
    let (base, target) = base_states(lock.status.lock_state)?;

    Ok(PresentedState {
        current: fault_overlay(&lock.status).unwrap_or(base),
        target,
        battery: battery_status(lock.flags.as_ref()),
        reachable: reachability(Some(lock)),
    })
}
