//! Order Service: orchestration between HTTP handlers, the payment stub,
//! and the row-locked order store.

use std::sync::Arc;

use crate::domain::{EmailAddress, HoldId, IdempotencyKey};

use super::error::OrderError;
use super::model::Order;
use super::payment::PaymentGateway;
use super::store::{NewOrderItem, OrderStore};
use crate::domain::OrderId;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<OrderStore>,
    payments: Arc<dyn PaymentGateway>,
}

impl OrderService {
    pub fn new(store: Arc<OrderStore>, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { store, payments }
    }

    #[tracing::instrument(skip(self, items), fields(idempotency_key = %idempotency_key))]
    pub async fn create(
        &self,
        idempotency_key: IdempotencyKey,
        customer_email: EmailAddress,
        hold_id: HoldId,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, bool), OrderError> {
        if items.is_empty() {
            return Err(OrderError::InvalidRequest("order must have at least one item".into()));
        }
        self.store.create(idempotency_key, customer_email, hold_id, items).await
    }

    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm(&self, order_id: OrderId) -> Result<Order, OrderError> {
        // The store itself locks the order row before deciding whether to
        // call the payment gateway, so two concurrent confirms on the same
        // pending order can never both charge it.
        self.store.confirm(order_id, self.payments.as_ref()).await
    }

    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.store.cancel(order_id).await
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.store.get(order_id).await
    }
}
