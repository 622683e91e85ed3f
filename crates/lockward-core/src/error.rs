// ── Core error types ──
//
// What the engine reports to its caller. Transport failures keep the
// underlying `lockward_api::Error` as their source and add the operation
// that failed; malformed push events never become errors at all.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An operation that needs the presentation layer ran before `bind`.
    #[error("Lock {serial} is not linked to a presentation service")]
    NotLinked { serial: String },

    /// The service's lock collection has no record for this serial.
    #[error("Could not find lock {serial}")]
    LockNotFound { serial: String },

    /// The shared gate is closed; no request was sent.
    #[error("Request blocked (rate limited) until {next_attempt_at}")]
    RateLimited { next_attempt_at: DateTime<Utc> },

    /// The remote call failed.
    #[error("An error occurred while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: lockward_api::Error,
    },

    /// The service reported a `lockState` outside the known table.
    #[error("Lock {serial} reported unrecognized lock state code {code}")]
    UnmappedLockState { serial: String, code: i64 },
}

impl CoreError {
    pub(crate) fn transport(context: impl Into<String>, source: lockward_api::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// `true` for failures that a later attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Transport { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
