//! Inventory Service: the orchestration layer between HTTP handlers and the
//! row-locked store. Thin by design — the critical section itself lives in
//! [`super::store::InventoryStore`]; this layer only adds instrumentation.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{HoldId, Quantity, SessionId, TicketTypeId};

use super::error::InventoryError;
use super::model::InventoryItem;
use super::store::InventoryStore;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<InventoryStore>,
}

impl InventoryService {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self), fields(hold_id = %hold_id))]
    pub async fn hold(
        &self,
        hold_id: HoldId,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
        quantity: Quantity,
        expires_at: DateTime<Utc>,
    ) -> Result<u32, InventoryError> {
        self.store
            .hold(hold_id, session_id, ticket_type_id, quantity, expires_at)
            .await
    }

    #[tracing::instrument(skip(self), fields(hold_id = %hold_id))]
    pub async fn release(&self, hold_id: HoldId) -> Result<(), InventoryError> {
        self.store.release(hold_id).await
    }

    #[tracing::instrument(skip(self), fields(hold_id = %hold_id))]
    pub async fn commit(&self, hold_id: HoldId) -> Result<(), InventoryError> {
        self.store.commit(hold_id).await
    }

    pub async fn availability(
        &self,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
    ) -> Result<InventoryItem, InventoryError> {
        self.store.availability(session_id, ticket_type_id).await
    }
}
