// ── Runtime connection configuration ──
//
// Describes *how* to reach the lock service. Carries credentials and
// tuning but never touches disk; the CLI builds a `ServiceConfig` and
// hands it in.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use lockward_api::{LockClient, RateLimiter, TransportConfig};

/// Configuration for one lock service subscription.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// REST base URL (e.g. `https://api.simplisafe.com/v1`).
    pub api_url: Url,
    /// Push-event WebSocket URL. `None` disables the push stream.
    pub events_url: Option<Url>,
    /// Subscription (location) the locks belong to.
    pub subscription_id: String,
    /// Bearer token.
    pub token: SecretString,
    /// Request timeout.
    pub timeout: Duration,
    /// How often to poll the lock collection (seconds). 0 = never.
    pub poll_interval_secs: u64,
    /// Gate backoff when a 429/403 carries no `Retry-After`.
    pub rate_limit_backoff: Duration,
    /// Accept invalid TLS certificates.
    pub accept_invalid_certs: bool,
}

impl ServiceConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(300);

    /// Config with default tuning and no push stream.
    pub fn new(api_url: Url, subscription_id: impl Into<String>, token: SecretString) -> Self {
        Self {
            api_url,
            events_url: None,
            subscription_id: subscription_id.into(),
            token,
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            rate_limit_backoff: Self::DEFAULT_RATE_LIMIT_BACKOFF,
            accept_invalid_certs: false,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    /// Polling interval, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    /// Build the shared client and its rate-limit gate.
    pub fn build_client(&self) -> Result<Arc<LockClient>, lockward_api::Error> {
        let limiter = RateLimiter::new(self.rate_limit_backoff);
        let client = LockClient::new(
            self.api_url.clone(),
            self.subscription_id.clone(),
            &self.token,
            &self.transport(),
            limiter,
        )?;
        Ok(Arc::new(client))
    }
}
