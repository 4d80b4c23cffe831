//! In-process event bus
//!
//! A tokio broadcast channel fans committed events out to any number of
//! receivers. Async subscribers are driven by spawned tasks.

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::ProtocolEvent;
use crate::subscriber::EventSubscriber;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for distributing committed events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProtocolEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.sender.subscribe()
    }

    /// Publish one event. Returns how many receivers saw it.
    pub fn publish(&self, event: ProtocolEvent) -> usize {
        debug!(event = event.name(), "Publishing event");
        // No receivers is not an error: events are not retained
        self.sender.send(event).unwrap_or(0)
    }

    /// Publish a committed batch in order
    pub fn publish_all(&self, events: impl IntoIterator<Item = ProtocolEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Drive `subscriber` from a spawned task until the bus is dropped
    pub fn spawn_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) -> JoinHandle<()> {
        let mut receiver = self.sender.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = subscriber.handle(&event).await {
                            warn!(subscriber = subscriber.name(), error = %e, "Subscriber failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(subscriber = subscriber.name(), skipped, "Subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
