//! Change-driven event fan-out.
//!
//! The [`EventBroadcaster`] polls each [`Topic`] on its own cadence, keeps
//! only snapshots whose fingerprint changed, and pushes them to every
//! registered subscriber channel.
//!
//! # Delivery
//!
//! Delivery is best-effort and latest-state-wins. Each send is bounded by
//! [`BroadcasterConfig::send_timeout`]; a subscriber whose queue stays full
//! for that long misses the message, and nobody else waits on it.

mod poller;
mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tailswan_core::{ControlError, IpsecControl, MeshControl, Message, Topic};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::state_tracker::StateTracker;
use registry::{Registry, SharedRegistry};

pub use registry::{ClientId, Subscription};

/// Queue depth of a subscriber channel.
pub const DEFAULT_CLIENT_CAPACITY: usize = 10;

/// Upper bound on a single send to one subscriber.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Interval of the keep-alive sent on subscriber streams.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error("channel is already registered as {0}")]
    AlreadyRegistered(ClientId),

    #[error("broadcaster is stopped")]
    Closed,
}

/// Tuning for the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcasterConfig {
    /// Poll period per topic, indexed by [`Topic::index`].
    pub intervals: [Duration; Topic::ALL.len()],
    pub send_timeout: Duration,
    pub client_capacity: usize,
    pub heartbeat_interval: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            intervals: Topic::ALL.map(Topic::default_interval),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            client_capacity: DEFAULT_CLIENT_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl BroadcasterConfig {
    /// Poll period for `topic`.
    pub const fn interval(&self, topic: Topic) -> Duration {
        self.intervals[topic.index()]
    }

    /// Override the poll period for one topic.
    #[must_use]
    pub const fn with_interval(mut self, topic: Topic, period: Duration) -> Self {
        self.intervals[topic.index()] = period;
        self
    }
}

/// Polls state sources and fans changes out to subscribers.
pub struct EventBroadcaster {
    registry: SharedRegistry,
    next_id: AtomicU64,
    tracker: StateTracker,
    ipsec: Option<Arc<dyn IpsecControl>>,
    mesh: Option<Arc<dyn MeshControl>>,
    config: BroadcasterConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("config", &self.config)
            .field("has_ipsec", &self.ipsec.is_some())
            .field("has_mesh", &self.mesh.is_some())
            .finish_non_exhaustive()
    }
}

impl EventBroadcaster {
    /// Create a broadcaster with no state sources attached.
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            next_id: AtomicU64::new(1),
            tracker: StateTracker::new(),
            ipsec: None,
            mesh: None,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Attach the IPsec control plane (SA and connection topics).
    #[must_use]
    pub fn with_ipsec(mut self, ipsec: Arc<dyn IpsecControl>) -> Self {
        self.ipsec = Some(ipsec);
        self
    }

    /// Attach the mesh control plane (peer and node topics).
    #[must_use]
    pub fn with_mesh(mut self, mesh: Arc<dyn MeshControl>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub const fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Register an existing channel.
    ///
    /// The same channel cannot be registered twice.
    pub async fn register_client(
        &self,
        tx: mpsc::Sender<Message>,
    ) -> Result<ClientId, BroadcastError> {
        let mut registry = self.registry.write().await;
        if registry.closed {
            return Err(BroadcastError::Closed);
        }
        if let Some((id, _)) = registry
            .clients
            .iter()
            .find(|(_, existing)| existing.same_channel(&tx))
        {
            return Err(BroadcastError::AlreadyRegistered(*id));
        }

        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        registry.clients.insert(id, tx);
        info!(client = %id, clients = registry.clients.len(), "Client registered");
        Ok(id)
    }

    /// Create and register a channel of the configured capacity.
    pub async fn subscribe(&self) -> Result<Subscription, BroadcastError> {
        let (tx, rx) = mpsc::channel(self.config.client_capacity);
        let id = self.register_client(tx).await?;
        Ok(Subscription::new(id, rx, Arc::clone(&self.registry)))
    }

    /// Remove a client; its receiver sees the channel close.
    ///
    /// Returns whether the client was registered.
    pub async fn unregister_client(&self, id: ClientId) -> bool {
        let mut registry = self.registry.write().await;
        let removed = registry.clients.remove(&id).is_some();
        if removed {
            info!(client = %id, clients = registry.clients.len(), "Client unregistered");
        }
        removed
    }

    pub async fn client_count(&self) -> usize {
        self.registry.read().await.clients.len()
    }

    pub async fn is_closed(&self) -> bool {
        self.registry.read().await.closed
    }

    /// Deliver `message` to every subscriber.
    ///
    /// Sends run concurrently, each bounded by the send timeout. Returns the
    /// number of subscribers that accepted the message.
    pub async fn broadcast(&self, message: Message) -> usize {
        let registry = self.registry.read().await;
        if registry.closed || registry.clients.is_empty() {
            return 0;
        }

        let timeout = self.config.send_timeout;
        let sends = registry.clients.iter().map(|(id, tx)| {
            let message = message.clone();
            async move {
                match tx.send_timeout(message, timeout).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(client = %id, "Dropped message: {}", e);
                        false
                    }
                }
            }
        });

        join_all(sends).await.into_iter().filter(|sent| *sent).count()
    }

    /// Run one poller per topic until `ctx` is cancelled or [`stop`](Self::stop)
    /// is called.
    ///
    /// Returns only after every poller has exited.
    pub async fn run(self: Arc<Self>, ctx: CancellationToken) {
        let token = self.shutdown.child_token();
        let mut pollers = JoinSet::new();

        for topic in Topic::ALL {
            let period = self.config.interval(topic);
            let span = info_span!("poller", topic = %topic);
            pollers.spawn(
                Arc::clone(&self)
                    .poll_topic(topic, period, token.clone())
                    .instrument(span),
            );
        }
        info!(topics = Topic::ALL.len(), "Event broadcaster started");

        tokio::select! {
            () = ctx.cancelled() => {}
            () = token.cancelled() => {}
        }
        token.cancel();

        while let Some(result) = pollers.join_next().await {
            if let Err(e) = result {
                warn!("Poller task failed: {}", e);
            }
        }
        info!("Event broadcaster stopped");
    }

    /// Stop polling and close every subscriber. Idempotent.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let mut registry = self.registry.write().await;
        if registry.closed {
            return;
        }
        registry.closed = true;
        let count = registry.clients.len();
        registry.clients.clear();
        info!(clients = count, "Closed all subscribers");
    }

    fn ipsec(&self) -> Result<&Arc<dyn IpsecControl>, ControlError> {
        self.ipsec.as_ref().ok_or(ControlError::Unavailable("ipsec"))
    }

    fn mesh(&self) -> Result<&Arc<dyn MeshControl>, ControlError> {
        self.mesh.as_ref().ok_or(ControlError::Unavailable("mesh"))
    }
}
