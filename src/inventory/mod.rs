//! Inventory Core: atomic seat allocation with time-bounded holds.
//!
//! See spec.md §4.1–§4.2. [`store::InventoryStore`] owns the row-locked
//! critical sections; [`service::InventoryService`] adds instrumentation;
//! [`http`] exposes the HTTP surface.

pub mod error;
pub mod http;
pub mod model;
pub mod service;
pub mod store;

pub use error::InventoryError;
pub use model::{Hold, HoldStatus, InventoryItem};
pub use service::InventoryService;
pub use store::InventoryStore;

#[cfg(test)]
mod tests {
    use super::model::{Hold, HoldStatus};
    use crate::domain::{HoldId, Quantity, SessionId, TicketTypeId};
    use chrono::Utc;
    use uuid::Uuid;

    fn held_hold() -> Hold {
        Hold {
            hold_id: HoldId::new(Uuid::new_v4()),
            session_id: SessionId::new(Uuid::new_v4()),
            ticket_type_id: TicketTypeId::new(Uuid::new_v4()),
            quantity: Quantity::new(2).unwrap(),
            status: HoldStatus::Held,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn held_hold_can_release_and_commit() {
        let hold = held_hold();
        assert!(hold.can_release());
        assert!(hold.can_commit());
        assert!(hold.is_held());
    }

    #[test]
    fn released_hold_cannot_commit() {
        let mut hold = held_hold();
        hold.status = HoldStatus::Released;
        assert!(hold.can_release()); // idempotent no-op
        assert!(!hold.can_commit());
        assert!(hold.status.is_terminal());
    }

    #[test]
    fn committed_hold_cannot_release() {
        let mut hold = held_hold();
        hold.status = HoldStatus::Committed;
        assert!(!hold.can_release());
        assert!(hold.can_commit()); // idempotent no-op
        assert!(hold.status.is_terminal());
    }
}
