//! Broadcast bus for duel announcements

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::DuelEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to the event bus
pub type SharedEventBus = Arc<DuelEventBus>;

/// Pub/sub fan-out of duel announcements over a Tokio broadcast channel.
///
/// Publishing with no subscribers is not an error; announcements are
/// best-effort and the engine never blocks on the presentation layer.
pub struct DuelEventBus {
    sender: broadcast::Sender<DuelEvent>,
}

impl DuelEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DuelEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "duel event published"),
            Err(_) => debug!(event_type, "duel event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DuelEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DuelEventBus {
    fn default() -> Self {
        Self::new()
    }
}
