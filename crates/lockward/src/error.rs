//! CLI error types with miette diagnostics.
//!
//! Maps core, client and config errors into user-facing errors with
//! actionable help text.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use thiserror::Error;

use lockward_config::ConfigError;
use lockward_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const RATE_LIMITED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the lock service")]
    #[diagnostic(
        code(lockward::connection_failed),
        help(
            "Check network access to the API URL.\n\
             Try: lockward status --insecure"
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(lockward::timeout),
        help("Increase timeout with --timeout or check service responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(lockward::auth_failed),
        help(
            "The bearer token was rejected. Refresh it and store it with:\n\
             lockward config set-token --profile <name>"
        )
    )]
    AuthFailed { message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(lockward::no_credentials),
        help(
            "Pass --token, set LOCKWARD_TOKEN, or store one with:\n\
             lockward config set-token"
        )
    )]
    NoCredentials { profile: String },

    // ── Service ──────────────────────────────────────────────────────
    #[error("Rate limited by the lock service until {next_attempt_at}")]
    #[diagnostic(
        code(lockward::rate_limited),
        help("The service refuses further requests until the time shown. Try again later.")
    )]
    RateLimited { next_attempt_at: DateTime<Utc> },

    #[error("Lock '{serial}' not found")]
    #[diagnostic(
        code(lockward::not_found),
        help("Run: lockward status to see available locks")
    )]
    LockNotFound { serial: String },

    #[error("Lock service error: {message}")]
    #[diagnostic(code(lockward::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lockward::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(lockward::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: lockward config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(lockward::no_config),
        help(
            "Create one with: lockward config init --subscription <id>\n\
             Or pass --api-url and --subscription.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(lockward::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::LockNotFound { .. } => exit_code::NOT_FOUND,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Error mapping ────────────────────────────────────────────────────

impl From<lockward_api::Error> for CliError {
    fn from(err: lockward_api::Error) -> Self {
        match err {
            lockward_api::Error::Transport(e) if e.is_timeout() => CliError::Timeout,
            lockward_api::Error::Transport(e) => CliError::ConnectionFailed {
                source: Box::new(e),
            },
            lockward_api::Error::WebSocketConnect(message) => CliError::ConnectionFailed {
                source: message.into(),
            },
            lockward_api::Error::Authentication { message } => CliError::AuthFailed { message },
            lockward_api::Error::RateLimited { retry_after_secs } => CliError::RateLimited {
                next_attempt_at: lockward_api::deadline_after(retry_after_secs),
            },
            other => CliError::ApiError {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockNotFound { serial } => CliError::LockNotFound { serial },
            CoreError::RateLimited { next_attempt_at } => CliError::RateLimited { next_attempt_at },
            CoreError::Transport { source, .. } => source.into(),
            other @ (CoreError::NotLinked { .. } | CoreError::UnmappedLockState { .. }) => {
                CliError::ApiError {
                    message: other.to_string(),
                }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}
