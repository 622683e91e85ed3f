//! Service session: one client, one gate, and an engine per lock.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockward_api::{EventStreamHandle, LockClient, ReconnectConfig};
use lockward_core::{
    EventBus, LockEngine, LockService, PresentationSink, RateLimitGate, ServiceConfig, find_lock,
    poll_locks, pump_service_events,
};

use crate::error::CliError;
use crate::sink::TracingSink;

pub struct Session {
    config: ServiceConfig,
    client: Arc<LockClient>,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
    events: Option<EventStreamHandle>,
}

impl Session {
    pub fn new(config: ServiceConfig) -> Result<Self, CliError> {
        let client = config.build_client()?;
        Ok(Self {
            config,
            client,
            bus: Arc::new(EventBus::new()),
            cancel: CancellationToken::new(),
            events: None,
        })
    }

    /// Override the poll interval (seconds). 0 disables polling.
    pub fn set_poll_interval(&mut self, secs: u64) {
        self.config.poll_interval_secs = secs;
    }

    /// Token cancelled by `shutdown`.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    fn service(&self) -> Arc<dyn LockService> {
        Arc::clone(&self.client) as Arc<dyn LockService>
    }

    fn gate(&self) -> Arc<dyn RateLimitGate> {
        Arc::new(self.client.rate_limiter().clone())
    }

    /// One unbound engine per lock on the subscription.
    pub async fn discover(&self) -> Result<Vec<LockEngine>, CliError> {
        let locks = self.client.list_locks().await?;
        debug!(count = locks.len(), "discovered locks");
        Ok(locks
            .iter()
            .map(|lock| LockEngine::for_lock(lock, self.service(), self.gate()))
            .collect())
    }

    /// Unbound engine for one serial.
    pub async fn engine(&self, serial: &str) -> Result<LockEngine, CliError> {
        let locks = self.client.list_locks().await?;
        let lock = find_lock(locks, serial)?;
        Ok(LockEngine::for_lock(&lock, self.service(), self.gate()))
    }

    /// Bind an engine to a logging sink, running its initial refresh.
    pub async fn bind(&self, engine: &LockEngine) -> Result<(), CliError> {
        let sink: Arc<dyn PresentationSink> = Arc::new(TracingSink::new(engine.serial()));
        engine.bind(sink).await?;
        Ok(())
    }

    /// Attach engines to the bus and start the push stream and poller.
    pub fn start(&mut self, engines: &[LockEngine]) -> Vec<JoinHandle<()>> {
        let mut tasks: Vec<JoinHandle<()>> = engines
            .iter()
            .map(|engine| engine.listen(&self.bus, self.cancel.child_token()))
            .collect();

        if let Some(url) = self.config.events_url.clone() {
            let handle = EventStreamHandle::connect(
                url,
                Some(self.config.token.clone()),
                ReconnectConfig::default(),
                self.cancel.child_token(),
            );
            tasks.push(tokio::spawn(pump_service_events(
                handle.subscribe(),
                Arc::clone(&self.bus),
                self.cancel.child_token(),
            )));
            self.events = Some(handle);
            info!("push event stream started");
        } else {
            warn!("no events_url configured; relying on polling");
        }

        if let Some(interval) = self.config.poll_interval() {
            tasks.push(tokio::spawn(poll_locks(
                self.service(),
                self.gate(),
                Arc::clone(&self.bus),
                interval,
                self.cancel.child_token(),
            )));
            debug!(interval_secs = interval.as_secs(), "lock poller started");
        }

        tasks
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(ref events) = self.events {
            events.shutdown();
        }
    }
}
