// lockward-core: Lock state reconciliation between lockward-api and a presentation layer.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod mapper;
pub mod model;
pub mod service;
pub mod stream;
pub mod tasks;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ServiceConfig;
pub use engine::{LockEngine, ReadMode, find_lock};
pub use error::CoreError;
pub use events::{EventBus, EventFilter, EventHandler, RegistrationId};
pub use mapper::{MappingError, map_state};
pub use service::{LockService, PresentationSink, RateLimitGate};
pub use stream::{PresentedStateStream, PresentedWatchStream};
pub use tasks::{poll_locks, poll_once, pump_service_events};

pub use model::{
    AccessoryInfo, BatteryStatus, LockCommand, LockCurrentState, LockEvent, LockEventKind,
    LockFlags, LockStatus, LockTargetState, PresentedState, RawLock,
};
