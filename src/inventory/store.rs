//! Postgres-backed inventory store: the row-locked critical sections that
//! back `hold`/`release`/`commit`/`availability`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{HoldId, Quantity, SessionId, TicketTypeId};
use crate::outbox::{self, NewOutboxRecord};

use super::error::InventoryError;
use super::model::{Hold, HoldStatus, InventoryItem};

const OUTBOX_TABLE: &str = "inventory_outbox";

pub struct InventoryStore {
    pool: PgPool,
}

impl InventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS inventory_items (
                session_id UUID NOT NULL,
                ticket_type_id UUID NOT NULL,
                total_quantity INT NOT NULL,
                available_quantity INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (session_id, ticket_type_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS holds (
                hold_id UUID PRIMARY KEY,
                session_id UUID NOT NULL,
                ticket_type_id UUID NOT NULL,
                quantity INT NOT NULL,
                status TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS holds_status_expires_at_idx ON holds (status, expires_at)")
            .execute(&self.pool)
            .await?;

        outbox::init_table(&self.pool, OUTBOX_TABLE).await?;
        Ok(())
    }

    /// Administrative/seed operation: creates an inventory item if it does
    /// not already exist. Not part of the Inventory Service's public
    /// contract — real item creation is owned by the external catalog.
    pub async fn ensure_item(
        &self,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
        total_quantity: u32,
    ) -> Result<(), InventoryError> {
        sqlx::query(
            "INSERT INTO inventory_items (session_id, ticket_type_id, total_quantity, available_quantity)
             VALUES ($1, $2, $3, $3)
             ON CONFLICT (session_id, ticket_type_id) DO NOTHING",
        )
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .bind(total_quantity as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn availability(
        &self,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
    ) -> Result<InventoryItem, InventoryError> {
        let row = sqlx::query(
            "SELECT session_id, ticket_type_id, total_quantity, available_quantity, created_at, updated_at
             FROM inventory_items WHERE session_id = $1 AND ticket_type_id = $2",
        )
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(InventoryError::ItemNotFound)?;

        Ok(row_to_item(&row))
    }

    /// Hold algorithm (spec.md 4.1). Runs the whole critical section in one
    /// transaction: lock the item row, consult any existing hold for
    /// idempotence, then decrement availability and insert the hold plus its
    /// `hold.created` outbox row.
    pub async fn hold(
        &self,
        hold_id: HoldId,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
        quantity: Quantity,
        expires_at: DateTime<Utc>,
    ) -> Result<u32, InventoryError> {
        let mut tx = self.pool.begin().await?;

        let item_row = sqlx::query(
            "SELECT available_quantity FROM inventory_items
             WHERE session_id = $1 AND ticket_type_id = $2 FOR UPDATE",
        )
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InventoryError::ItemNotFound)?;
        let available: i32 = item_row.try_get("available_quantity")?;

        let existing_hold = sqlx::query("SELECT 1 FROM holds WHERE hold_id = $1 FOR UPDATE")
            .bind(hold_id.get())
            .fetch_optional(&mut *tx)
            .await?;

        if existing_hold.is_some() {
            // Any existing hold, in any status, is a terminal or matching
            // idempotent no-op — the row lock above already serializes this
            // against concurrent holders.
            tx.commit().await?;
            return Ok(available as u32);
        }

        if available < quantity.get() as i32 {
            tx.rollback().await?;
            return Err(InventoryError::InsufficientInventory {
                available: available as u32,
                requested: quantity.get(),
            });
        }

        let new_available = available - quantity.get() as i32;
        sqlx::query(
            "UPDATE inventory_items SET available_quantity = $1, updated_at = now()
             WHERE session_id = $2 AND ticket_type_id = $3",
        )
        .bind(new_available)
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO holds (hold_id, session_id, ticket_type_id, quantity, status, expires_at)
             VALUES ($1, $2, $3, $4, 'held', $5)",
        )
        .bind(hold_id.get())
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .bind(quantity.get() as i32)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        let payload = serde_json::json!({
            "hold_id": hold_id.get(),
            "session_id": session_id.get(),
            "ticket_type_id": ticket_type_id.get(),
            "quantity": quantity.get(),
            "expires_at": expires_at,
        });
        outbox::insert_in_tx(
            &mut tx,
            OUTBOX_TABLE,
            &NewOutboxRecord::new("hold.created", hold_id.get(), payload),
        )
        .await?;

        tx.commit().await?;
        Ok(new_available as u32)
    }

    /// Release algorithm (spec.md 4.1).
    pub async fn release(&self, hold_id: HoldId) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        Self::release_in_tx(&mut tx, hold_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Same algorithm as [`Self::release`], but runs inside a transaction
    /// the caller already holds open — used by the consumer runtime so the
    /// release and its `ConsumedEvent` dedup row commit atomically together.
    pub(crate) async fn release_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hold_id: HoldId,
    ) -> Result<(), InventoryError> {
        let hold_row = sqlx::query(
            "SELECT session_id, ticket_type_id, quantity, status FROM holds WHERE hold_id = $1 FOR UPDATE",
        )
        .bind(hold_id.get())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(InventoryError::HoldNotFound)?;

        let status: String = hold_row.try_get("status")?;
        match status.as_str() {
            "released" => Ok(()),
            "committed" => Err(InventoryError::InvalidStateTransition),
            "held" => {
                let session_id: Uuid = hold_row.try_get("session_id")?;
                let ticket_type_id: Uuid = hold_row.try_get("ticket_type_id")?;
                let quantity: i32 = hold_row.try_get("quantity")?;

                sqlx::query(
                    "SELECT available_quantity FROM inventory_items
                     WHERE session_id = $1 AND ticket_type_id = $2 FOR UPDATE",
                )
                .bind(session_id)
                .bind(ticket_type_id)
                .fetch_one(&mut **tx)
                .await?;

                sqlx::query(
                    "UPDATE inventory_items SET available_quantity = available_quantity + $1, updated_at = now()
                     WHERE session_id = $2 AND ticket_type_id = $3",
                )
                .bind(quantity)
                .bind(session_id)
                .bind(ticket_type_id)
                .execute(&mut **tx)
                .await?;

                sqlx::query("UPDATE holds SET status = 'released', updated_at = now() WHERE hold_id = $1")
                    .bind(hold_id.get())
                    .execute(&mut **tx)
                    .await?;

                Ok(())
            }
            other => unreachable!("unexpected hold status in storage: {other}"),
        }
    }

    /// Commit algorithm (spec.md 4.1). Status only — `available_quantity`
    /// never changes here; held capacity is merely reclassified.
    pub async fn commit(&self, hold_id: HoldId) -> Result<(), InventoryError> {
        let mut tx = self.pool.begin().await?;
        Self::commit_in_tx(&mut tx, hold_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Same algorithm as [`Self::commit`], scoped to a caller-held transaction.
    ///
    /// Locks only the `holds` row, not the inventory item row the commit
    /// algorithm also names — intentional, since commit never reads or
    /// writes `available_quantity`; the hold row's own lock is already
    /// enough to serialize concurrent commit/release calls for this hold.
    pub(crate) async fn commit_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hold_id: HoldId,
    ) -> Result<(), InventoryError> {
        let hold_row = sqlx::query("SELECT status FROM holds WHERE hold_id = $1 FOR UPDATE")
            .bind(hold_id.get())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(InventoryError::HoldNotFound)?;

        let status: String = hold_row.try_get("status")?;
        match status.as_str() {
            "committed" => Ok(()),
            "released" => Err(InventoryError::InvalidStateTransition),
            "held" => {
                sqlx::query("UPDATE holds SET status = 'committed', updated_at = now() WHERE hold_id = $1")
                    .bind(hold_id.get())
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            }
            other => unreachable!("unexpected hold status in storage: {other}"),
        }
    }

    /// Exposes the store's pool so the consumer runtime can open one
    /// transaction spanning both the hold mutation and the dedup insert.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[cfg(test)]
    pub async fn get_hold(&self, hold_id: HoldId) -> Result<Hold, InventoryError> {
        let row = sqlx::query(
            "SELECT hold_id, session_id, ticket_type_id, quantity, status, expires_at, created_at, updated_at
             FROM holds WHERE hold_id = $1",
        )
        .bind(hold_id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(InventoryError::HoldNotFound)?;
        Ok(row_to_hold(&row))
    }
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> InventoryItem {
    InventoryItem {
        session_id: SessionId::new(row.get("session_id")),
        ticket_type_id: TicketTypeId::new(row.get("ticket_type_id")),
        total_quantity: row.get::<i32, _>("total_quantity") as u32,
        available_quantity: row.get::<i32, _>("available_quantity") as u32,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_hold(row: &sqlx::postgres::PgRow) -> Hold {
    let status: String = row.get("status");
    Hold {
        hold_id: HoldId::new(row.get("hold_id")),
        session_id: SessionId::new(row.get("session_id")),
        ticket_type_id: TicketTypeId::new(row.get("ticket_type_id")),
        quantity: Quantity::new(row.get::<i32, _>("quantity") as u32).expect("stored quantity is always > 0"),
        status: match status.as_str() {
            "held" => HoldStatus::Held,
            "released" => HoldStatus::Released,
            "committed" => HoldStatus::Committed,
            other => unreachable!("unexpected hold status in storage: {other}"),
        },
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
