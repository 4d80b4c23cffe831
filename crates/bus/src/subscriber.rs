//! Event subscriber trait for async event handling

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::BusError;
use crate::event::ProtocolEvent;

/// Trait for event subscribers
///
/// Subscribers receive events from the event bus after the operation that
/// produced them committed.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Get the subscriber name (for logging)
    fn name(&self) -> &str;

    /// Handle a protocol event
    async fn handle(&self, event: &ProtocolEvent) -> Result<(), BusError>;
}

/// Records every event it receives
#[derive(Debug)]
pub struct EventLog {
    name: String,
    events: Mutex<Vec<ProtocolEvent>>,
}

impl EventLog {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, event: ProtocolEvent) -> Result<(), BusError> {
        self.events
            .lock()
            .map_err(|_| BusError::SubscriberFailed {
                name: self.name.clone(),
                reason: "event log poisoned".to_string(),
            })?
            .push(event);
        Ok(())
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<ProtocolEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded events rendered as JSON lines
    pub fn to_json_lines(&self) -> Result<Vec<String>, BusError> {
        self.events()
            .iter()
            .map(|e| serde_json::to_string(e).map_err(BusError::from))
            .collect()
    }
}

#[async_trait]
impl EventSubscriber for EventLog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &ProtocolEvent) -> Result<(), BusError> {
        self.record(event.clone())
    }
}
