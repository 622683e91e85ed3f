// ── Domain model ──
//
// Presented state owned by the engine, and the events it reacts to.
// Raw wire records stay in `lockward_api::models`.

pub mod event;
pub mod lock;

pub use event::{LockEvent, LockEventKind};
pub use lock::{AccessoryInfo, BatteryStatus, LockCurrentState, LockTargetState, PresentedState};

pub use lockward_api::{LockCommand, LockFlags, LockStatus, RawLock};
