// lockward-api: Async Rust client for the SimpliSafe smart lock cloud API

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod rate_limit;
pub mod transport;

pub use client::LockClient;
pub use error::Error;
pub use events::{EventStreamHandle, ReconnectConfig, ServiceEvent, ServiceEventKind};
pub use models::{LockCommand, LockFlags, LockStatus, RawLock, UNKNOWN_LOCK_STATE};
pub use rate_limit::{GateState, RateLimiter, deadline_after};
pub use transport::TransportConfig;
