//! Event bus abstraction: the `EventEnvelope` wire shape and the
//! `EventBus` trait implementations publish to / consume from.

pub mod amqp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// JSON event envelope carried over AMQP. Message properties
/// (`content_type=application/json`, `delivery_mode=2`, `message_id=event_id`)
/// are set by the bus implementation, not carried in this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub aggregate_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, aggregate_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            aggregate_id,
            idempotency_key: None,
            payload,
        }
    }
}

/// Errors raised by an `EventBus` implementation.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish event: {0}")]
    PublishFailed(String),
    #[error("failed to connect to broker: {0}")]
    Connection(String),
    #[error("failed to decode envelope: {0}")]
    Decode(String),
}

/// A delivered message, handed to the consumer runtime along with a
/// means of acking or nacking it.
#[async_trait]
pub trait Delivery: Send {
    fn envelope(&self) -> &EventEnvelope;
    /// Current redelivery count as reported by the broker, where available.
    /// AMQP does not give a reliable per-message count without extra
    /// dead-letter-exchange bookkeeping, so the consumer runtime keeps its
    /// own attempt counter rather than relying on this for retry decisions.
    fn redelivery_count(&self) -> u32;
    async fn ack(self: Box<Self>) -> Result<(), BusError>;
    /// Nack and request requeue (transient failure, retry budget remains).
    async fn nack_requeue(self: Box<Self>) -> Result<(), BusError>;
    /// Nack without requeue — routes the message to the dead-letter exchange.
    async fn nack_dead_letter(self: Box<Self>) -> Result<(), BusError>;
}

/// Publish-side operations against the topic exchange.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event, routing key = `envelope.event_type`.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BusError>;
}

/// An in-memory bus for unit tests: publishing simply appends to a shared
/// buffer callers can inspect, with no network, broker, or consumer side.
#[derive(Default)]
pub struct MockEventBus {
    published: Mutex<Vec<EventEnvelope>>,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BusError> {
        self.published.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_bus_records_published_envelopes() {
        let bus = MockEventBus::new();
        let envelope = EventEnvelope::new("hold.created", Uuid::new_v4(), serde_json::json!({}));
        bus.publish(&envelope).await.unwrap();
        assert_eq!(bus.published().len(), 1);
        assert_eq!(bus.published()[0].event_type, "hold.created");
    }
}
