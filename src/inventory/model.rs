//! Inventory-side data model: the item/hold pair the inventory service owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{HoldId, Quantity, SessionId, TicketTypeId};

/// One per `(session_id, ticket_type_id)`. `total_quantity` is fixed after
/// creation; `available_quantity` is the only mutable field, changed solely
/// under the row lock taken in the hold/release critical sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub session_id: SessionId,
    pub ticket_type_id: TicketTypeId,
    pub total_quantity: u32,
    pub available_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn held_quantity(&self) -> u32 {
        self.total_quantity.saturating_sub(self.available_quantity)
    }
}

/// Inventory-side hold status. `Committed` and `Released` are both terminal;
/// neither ever transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Held,
    Released,
    Committed,
}

impl HoldStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HoldStatus::Released | HoldStatus::Committed)
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HoldStatus::Held => "held",
            HoldStatus::Released => "released",
            HoldStatus::Committed => "committed",
        };
        f.write_str(s)
    }
}

/// A hold on the inventory side: the quantity carved out of
/// `available_quantity` for a caller-assigned `hold_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: HoldId,
    pub session_id: SessionId,
    pub ticket_type_id: TicketTypeId,
    pub quantity: Quantity,
    pub status: HoldStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hold {
    pub fn can_release(&self) -> bool {
        matches!(self.status, HoldStatus::Held | HoldStatus::Released)
    }

    pub fn can_commit(&self) -> bool {
        matches!(self.status, HoldStatus::Held | HoldStatus::Committed)
    }

    pub fn is_held(&self) -> bool {
        self.status == HoldStatus::Held
    }
}
