//! Insert-event bus.
//!
//! Every committed insert batch is published as one event. Consumers
//! subscribe before inserts begin and drain their own queue; publishing
//! never blocks on consumers, so the insert path is independent of whatever
//! work (such as sub-resource registration) a subscriber performs.

use tokio::sync::broadcast;
use tracing::debug;

use super::document::Document;

/// Default capacity of the broadcast queue per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Notification that new documents were committed to a collection.
#[derive(Debug, Clone)]
pub struct InsertEvent {
    /// The collection the documents were inserted into.
    pub collection: String,

    /// The stored documents, metadata included, in insertion order.
    pub documents: Vec<Document>,
}

/// Broadcast fan-out for insert events.
pub struct EventBus {
    sender: broadcast::Sender<InsertEvent>,
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Open a new subscription. Only events published after this call are
    /// delivered to the returned receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<InsertEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: InsertEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("Insert event delivered to {} subscriber(s)", receivers),
            Err(_) => debug!("Insert event dropped: no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
