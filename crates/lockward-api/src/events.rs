//! Push-event stream with auto-reconnect.
//!
//! Connects to the lock service's event WebSocket and fans parsed
//! [`ServiceEvent`]s out through a [`tokio::sync::broadcast`] channel.
//! Reconnects with exponential backoff + jitter until cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use lockward_api::events::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = EventStreamHandle::connect(events_url, Some(token), ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{:?} from {:?}", event.kind(), event.sensor_serial);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ServiceEvent ─────────────────────────────────────────────────────

/// Lock-related event codes the service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    DoorLockUnlocked,
    DoorLockLocked,
    DoorLockError,
}

impl ServiceEventKind {
    pub const UNLOCKED_CID: u32 = 9700;
    pub const LOCKED_CID: u32 = 9701;
    pub const ERROR_CID: u32 = 9703;

    pub fn from_cid(cid: u32) -> Option<Self> {
        match cid {
            Self::UNLOCKED_CID => Some(Self::DoorLockUnlocked),
            Self::LOCKED_CID => Some(Self::DoorLockLocked),
            Self::ERROR_CID => Some(Self::DoorLockError),
            _ => None,
        }
    }
}

/// A parsed event from the push stream.
///
/// Only the event code and originating sensor are modelled; everything
/// else the service sends is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    pub event_cid: u32,

    /// Serial of the device that raised the event, if any.
    #[serde(default)]
    pub sensor_serial: Option<String>,

    /// Epoch seconds from the service.
    #[serde(default)]
    pub event_timestamp: Option<i64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServiceEvent {
    /// Lock event kind, or `None` for events unrelated to locks.
    pub fn kind(&self) -> Option<ServiceEventKind> {
        ServiceEventKind::from_cid(self.event_cid)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running push-event stream.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<ServiceEvent>>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the connect/reconnect loop and return immediately.
    ///
    /// The first connection attempt happens in the background; subscribe
    /// to start consuming events.
    pub fn connect(
        events_url: Url,
        token: Option<SecretString>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            stream_loop(events_url, token, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServiceEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

async fn stream_loop(
    url: Url,
    token: Option<SecretString>,
    event_tx: broadcast::Sender<Arc<ServiceEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, token.as_ref(), &event_tx, &cancel) => result,
        };

        match result {
            Ok(()) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::info!("event stream disconnected cleanly, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "event stream error");

                if reconnect.max_retries.is_some_and(|max| attempt >= max) {
                    tracing::error!(attempt, "event stream reconnection limit reached, giving up");
                    break;
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!("event stream loop exiting");
}

/// One connection lifecycle: connect, read until the socket drops.
async fn connect_and_read(
    url: &Url,
    token: Option<&SecretString>,
    event_tx: &broadcast::Sender<Arc<ServiceEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = token {
        request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("event stream connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => parse_and_broadcast(&text, event_tx),
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    if let Some(cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "event stream closed by server");
                    }
                    return Ok(());
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => return Ok(()),
                // Binary, Ping, Pong, Frame
                Some(Ok(_)) => {}
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// A text frame carries either one event object or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Batch(Vec<serde_json::Value>),
    Single(serde_json::Value),
}

fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<ServiceEvent>>) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparseable event frame");
            return;
        }
    };

    let values = match frame {
        Frame::Batch(values) => values,
        Frame::Single(value) => vec![value],
    };

    for value in values {
        match serde_json::from_value::<ServiceEvent>(value) {
            // Send errors just mean nobody is subscribed right now.
            Ok(event) => {
                let _ = event_tx.send(Arc::new(event));
            }
            Err(e) => tracing::debug!(error = %e, "dropping malformed event"),
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `delay = min(initial * 2^attempt, max)` with a deterministic ±25% jitter.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
