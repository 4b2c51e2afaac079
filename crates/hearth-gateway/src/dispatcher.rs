use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use hearth_types::events::GatewayEvent;

/// Fans `message.sent` events out to connected gateway clients.
///
/// Delivery is at-most-once and best-effort: with nobody connected the event
/// is dropped on the floor. The ledger remains the source of truth and
/// clients reconcile through the message list, de-duplicating by id —
/// arrival order here implies nothing about ledger order.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to the event stream. Each connection filters what it
    /// forwards by its own granted conversation set.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Failure is non-fatal — the message this announces
    /// is already durable.
    pub fn publish(&self, event: GatewayEvent) {
        if self.inner.broadcast_tx.send(event).is_err() {
            debug!("gateway event dropped, no connected subscribers");
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
