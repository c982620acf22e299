//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Services publish
//! a [`GigEvent`] after each committed mutation; the audit recorder
//! subscribes and persists them off the request path.

use tokio::sync::broadcast;

use super::GigEvent;

/// Broadcast bus for [`GigEvent`]s.
///
/// When the ring buffer is full the oldest events are dropped for lagging
/// receivers; publishing never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GigEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: GigEvent) -> usize {
        tracing::trace!(
            event_type = event.event_type_str(),
            tenant_id = %event.tenant_id(),
            "publishing event"
        );
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GigEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
