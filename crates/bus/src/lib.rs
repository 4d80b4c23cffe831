//! Basket Event Bus - In-process distribution of committed protocol events
//!
//! Engines buffer the events of an operation; the transaction facade hands
//! them to the bus only after the operation committed. Nothing is retained in
//! the bus itself.
//!
//! - `ProtocolEvent`: every event an engine can emit
//! - `EventBus`: tokio broadcast channel plus spawned async subscribers
//! - `EventLog`: subscriber that records events in memory

pub mod channel;
pub mod error;
pub mod event;
pub mod subscriber;

pub use channel::EventBus;
pub use error::BusError;
pub use event::ProtocolEvent;
pub use subscriber::{EventLog, EventSubscriber};
