//! Order Core: an idempotent order state machine with a stubbed payment
//! seam, linked to a prior inventory hold. See spec.md §4.3.

pub mod error;
pub mod http;
pub mod model;
pub mod payment;
pub mod service;
pub mod store;

pub use error::OrderError;
pub use model::{Order, OrderItem, OrderStatus, Payment, PaymentStatus};
pub use payment::{AlwaysSucceeds, FixedOutcome, PaymentGateway};
pub use service::OrderService;
pub use store::OrderStore;

#[cfg(test)]
mod tests {
    use super::model::{Order, OrderItem, OrderStatus};
    use crate::domain::{EmailAddress, HoldId, IdempotencyKey, Money, OrderId, Quantity, SessionId, TicketTypeId};
    use chrono::Utc;
    use uuid::Uuid;

    fn pending_order() -> Order {
        Order {
            order_id: OrderId::new(Uuid::new_v4()),
            customer_email: EmailAddress::parse("u@example.com").unwrap(),
            status: OrderStatus::Pending,
            total_amount: Money::from_minor_units(10_000).unwrap(),
            idempotency_key: IdempotencyKey::new(Uuid::new_v4()),
            hold_id: HoldId::new(Uuid::new_v4()),
            items: vec![OrderItem {
                session_id: SessionId::new(Uuid::new_v4()),
                ticket_type_id: TicketTypeId::new(Uuid::new_v4()),
                quantity: Quantity::new(2).unwrap(),
                unit_price: Money::from_minor_units(5_000).unwrap(),
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_order_can_confirm_or_cancel() {
        let order = pending_order();
        assert!(order.is_pending());
        assert!(order.can_confirm());
        assert!(order.can_cancel());
    }

    #[test]
    fn confirmed_order_cannot_cancel() {
        let mut order = pending_order();
        order.status = OrderStatus::Confirmed;
        assert!(order.can_confirm()); // idempotent re-confirm returns current state
        assert!(!order.can_cancel());
        assert!(order.status.is_terminal());
    }

    #[test]
    fn cancelled_order_cannot_confirm() {
        let mut order = pending_order();
        order.status = OrderStatus::Cancelled;
        assert!(!order.can_confirm());
        assert!(order.can_cancel()); // idempotent re-cancel
        assert!(order.status.is_terminal());
    }
}
