//! Wires inventory-affecting events to the inventory store: `order.confirmed`
//! commits the hold it references, `hold.expired` releases it. See spec.md
//! §4.6.

use std::sync::Arc;

use crate::bus::EventEnvelope;
use crate::domain::HoldId;
use crate::inventory::{InventoryError, InventoryStore};

use super::{EventHandler, HandlerOutcome};

pub struct InventoryEventHandler {
    store: Arc<InventoryStore>,
}

impl InventoryEventHandler {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl EventHandler for InventoryEventHandler {
    fn name(&self) -> &'static str {
        "inventory_consumer"
    }

    async fn handle(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        envelope: &EventEnvelope,
    ) -> HandlerOutcome {
        let result = match envelope.event_type.as_str() {
            "order.confirmed" => match extract_hold_id(envelope) {
                Ok(hold_id) => InventoryStore::commit_in_tx(tx, hold_id).await,
                Err(e) => return HandlerOutcome::Permanent(e),
            },
            "hold.expired" => match extract_hold_id(envelope) {
                Ok(hold_id) => InventoryStore::release_in_tx(tx, hold_id).await,
                Err(e) => return HandlerOutcome::Permanent(e),
            },
            other => {
                // Not ours; the queue is bound to exactly the routing keys
                // this handler understands, so this should not happen.
                return HandlerOutcome::Permanent(format!("unexpected event type: {other}"));
            }
        };

        match result {
            Ok(()) => HandlerOutcome::Applied,
            Err(InventoryError::InvalidStateTransition) => {
                // The hold already moved to a terminal state that conflicts
                // with this event — nothing left to retry.
                HandlerOutcome::Permanent("hold already in a conflicting terminal state".into())
            }
            Err(InventoryError::HoldNotFound) => {
                HandlerOutcome::Permanent("referenced hold does not exist".into())
            }
            Err(e @ InventoryError::Database(_)) => HandlerOutcome::Transient(e.to_string()),
            Err(e) => HandlerOutcome::Permanent(e.to_string()),
        }
    }
}

fn extract_hold_id(envelope: &EventEnvelope) -> Result<HoldId, String> {
    envelope
        .payload
        .get("hold_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "payload missing hold_id".to_string())
        .and_then(|s| uuid::Uuid::parse_str(s).map_err(|e| e.to_string()))
        .map(HoldId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_hold_id_rejects_missing_field() {
        let envelope = EventEnvelope::new("order.confirmed", uuid::Uuid::new_v4(), serde_json::json!({}));
        assert!(extract_hold_id(&envelope).is_err());
    }

    #[test]
    fn extract_hold_id_parses_present_field() {
        let hold_id = uuid::Uuid::new_v4();
        let envelope = EventEnvelope::new(
            "order.confirmed",
            uuid::Uuid::new_v4(),
            serde_json::json!({ "hold_id": hold_id.to_string() }),
        );
        assert_eq!(extract_hold_id(&envelope).unwrap().get(), hold_id);
    }
}
