// Lock service HTTP client
//
// Wraps `reqwest::Client` with subscription-scoped URL construction,
// status handling and rate-limit bookkeeping. Every response updates the
// shared `RateLimiter`: 429/403 engage it, success lifts it.

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{LockCommand, RawLock, SetLockStateRequest};
use crate::rate_limit::{RateLimiter, deadline_after};
use crate::transport::TransportConfig;

/// HTTP client for the lock endpoints of one subscription.
pub struct LockClient {
    http: reqwest::Client,
    base_url: Url,
    subscription_id: String,
    limiter: RateLimiter,
}

impl LockClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `https://api.simplisafe.com/v1`).
    /// The `limiter` is shared with every consumer that needs to know when
    /// the service is refusing requests.
    pub fn new(
        base_url: Url,
        subscription_id: String,
        token: &SecretString,
        transport: &TransportConfig,
        limiter: RateLimiter,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self::with_client(http, base_url, subscription_id, limiter))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        subscription_id: String,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            http,
            base_url,
            subscription_id,
            limiter,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The shared rate-limit gate this client maintains.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List every lock on the subscription.
    ///
    /// `GET {base}/doorlock/{subscription}`
    pub async fn list_locks(&self) -> Result<Vec<RawLock>, Error> {
        let url = self.doorlock_url(&[])?;
        debug!("listing locks");
        self.get(url).await
    }

    /// Ask the service to lock or unlock a device.
    ///
    /// `POST {base}/doorlock/{subscription}/{serial}/state` with `{"state": "lock"}`
    pub async fn set_lock_state(&self, serial: &str, command: LockCommand) -> Result<(), Error> {
        let url = self.doorlock_url(&[serial, "state"])?;
        debug!(serial, %command, "setting lock state");
        let _: serde_json::Value = self
            .post(url, &SetLockStateRequest { state: command })
            .await?;
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/doorlock/{subscription}/{segments...}`
    fn doorlock_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("doorlock")
            .push(&self.subscription_id)
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        self.parse_response(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: &impl Serialize) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        self.parse_response(resp).await
    }

    /// Map the HTTP status onto the error taxonomy, keep the gate current,
    /// and decode the body on success. An empty success body decodes as
    /// JSON `null`.
    async fn parse_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or_else(|| self.limiter.default_backoff().as_secs());
            self.limiter.block_until(deadline_after(retry_after_secs));
            return Err(Error::RateLimited { retry_after_secs });
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "token expired or invalid".into(),
            });
        }

        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.canonical_reason().unwrap_or("unknown").to_owned()
                } else {
                    body
                },
            });
        }

        self.limiter.clear();

        let parsed = if body.trim().is_empty() {
            serde_json::from_str("null")
        } else {
            serde_json::from_str(&body)
        };
        parsed.map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
