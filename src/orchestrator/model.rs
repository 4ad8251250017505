//! The orchestrator's own hold record: a thin mirror of the inventory-side
//! hold lifecycle plus the customer metadata the inventory core has no
//! reason to know about. See spec.md §4.7.

use chrono::{DateTime, Utc};

use crate::domain::{EmailAddress, HoldId, Quantity, SessionId, TicketTypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorHoldStatus {
    /// Mirrors an inventory-side `HELD` hold that has not yet expired.
    Active,
    /// Swept by the expiry loop; `hold.expired` has been (or will be)
    /// delivered to the inventory consumer.
    Expired,
}

impl std::fmt::Display for OrchestratorHoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorHold {
    pub hold_id: HoldId,
    pub session_id: SessionId,
    pub ticket_type_id: TicketTypeId,
    pub quantity: Quantity,
    pub customer_email: EmailAddress,
    pub status: OrchestratorHoldStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
