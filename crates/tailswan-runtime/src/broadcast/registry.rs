//! Subscriber registry and the subscription guard.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tailswan_core::Message;
use tokio::runtime::Handle;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Identifier assigned to a registered subscriber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) clients: HashMap<ClientId, mpsc::Sender<Message>>,
    pub(crate) closed: bool,
}

pub(crate) type SharedRegistry = Arc<RwLock<Registry>>;

/// A registered subscriber channel.
///
/// Dropping the subscription unregisters it from the broadcaster.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    rx: mpsc::Receiver<Message>,
    registry: SharedRegistry,
}

impl Subscription {
    pub(crate) fn new(id: ClientId, rx: mpsc::Receiver<Message>, registry: SharedRegistry) -> Self {
        Self { id, rx, registry }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next message, or `None` once the broadcaster has dropped this client.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Message, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.id;
        if let Ok(mut registry) = self.registry.try_write() {
            registry.clients.remove(&id);
            debug!(client = %id, "Subscription dropped");
            return;
        }

        // Registry is busy; finish the removal asynchronously.
        if let Ok(handle) = Handle::try_current() {
            let registry = Arc::clone(&self.registry);
            handle.spawn(async move {
                registry.write().await.clients.remove(&id);
                debug!(client = %id, "Subscription dropped");
            });
        }
    }
}
