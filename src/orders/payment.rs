//! Payment stub. Real payment processing is out of scope; this is the
//! injectable seam the spec calls for so tests can exercise the
//! `PAYMENT_FAILED` path deterministically.

use async_trait::async_trait;

use crate::domain::{Money, OrderId};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, order_id: OrderId, amount: Money) -> bool;
}

/// Always succeeds — the default in every environment that has not wired
/// up a fault-injection hook.
pub struct AlwaysSucceeds;

#[async_trait]
impl PaymentGateway for AlwaysSucceeds {
    async fn charge(&self, _order_id: OrderId, _amount: Money) -> bool {
        true
    }
}

/// Test/fault-injection gateway whose outcome is fixed at construction.
pub struct FixedOutcome(pub bool);

#[async_trait]
impl PaymentGateway for FixedOutcome {
    async fn charge(&self, _order_id: OrderId, _amount: Money) -> bool {
        self.0
    }
}
