//! Postgres-backed store for the orchestrator's own hold mirror.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::{EmailAddress, HoldId, Quantity, SessionId, TicketTypeId};
use crate::outbox::{self, NewOutboxRecord};

use super::error::OrchestratorError;
use super::model::{OrchestratorHold, OrchestratorHoldStatus};

const OUTBOX_TABLE: &str = "orchestrator_outbox";

pub struct OrchestratorHoldStore {
    pool: PgPool,
}

impl OrchestratorHoldStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orchestrator_holds (
                hold_id UUID PRIMARY KEY,
                session_id UUID NOT NULL,
                ticket_type_id UUID NOT NULL,
                quantity INT NOT NULL,
                customer_email TEXT NOT NULL,
                status TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS orchestrator_holds_status_expires_at_idx
             ON orchestrator_holds (status, expires_at)",
        )
        .execute(&self.pool)
        .await?;

        outbox::init_table(&self.pool, OUTBOX_TABLE).await?;
        Ok(())
    }

    /// Records the orchestrator's mirror of a hold the inventory service
    /// has already accepted. Called after a successful synchronous call to
    /// `POST /inventory/hold`.
    pub async fn record_active(
        &self,
        hold_id: HoldId,
        session_id: SessionId,
        ticket_type_id: TicketTypeId,
        quantity: Quantity,
        customer_email: &EmailAddress,
        expires_at: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        sqlx::query(
            "INSERT INTO orchestrator_holds
                (hold_id, session_id, ticket_type_id, quantity, customer_email, status, expires_at)
             VALUES ($1, $2, $3, $4, $5, 'active', $6)
             ON CONFLICT (hold_id) DO NOTHING",
        )
        .bind(hold_id.get())
        .bind(session_id.get())
        .bind(ticket_type_id.get())
        .bind(quantity.get() as i32)
        .bind(customer_email.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Expiry sweep (spec.md §4.7): picks up to `batch_size` holds still
    /// `active` whose `expires_at` has passed, flips each to `expired`, and
    /// writes its `hold.expired` outbox row — all in one transaction, so a
    /// crash mid-batch cannot lose an expiry or double-emit its event.
    pub async fn expire_overdue(&self, batch_size: i64) -> Result<Vec<HoldId>, OrchestratorError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT hold_id FROM orchestrator_holds
             WHERE status = 'active' AND expires_at < now()
             ORDER BY expires_at ASC
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        let mut expired = Vec::with_capacity(rows.len());
        for row in &rows {
            let hold_id: uuid::Uuid = row.try_get("hold_id")?;
            let hold_id = HoldId::new(hold_id);

            sqlx::query("UPDATE orchestrator_holds SET status = 'expired', updated_at = now() WHERE hold_id = $1")
                .bind(hold_id.get())
                .execute(&mut *tx)
                .await?;

            let payload = serde_json::json!({ "hold_id": hold_id.get() });
            outbox::insert_in_tx(
                &mut tx,
                OUTBOX_TABLE,
                &NewOutboxRecord::new("hold.expired", hold_id.get(), payload),
            )
            .await?;

            expired.push(hold_id);
        }

        tx.commit().await?;
        Ok(expired)
    }

    #[cfg(test)]
    pub async fn get(&self, hold_id: HoldId) -> Result<OrchestratorHold, OrchestratorError> {
        let row = sqlx::query(
            "SELECT hold_id, session_id, ticket_type_id, quantity, customer_email, status, expires_at, created_at, updated_at
             FROM orchestrator_holds WHERE hold_id = $1",
        )
        .bind(hold_id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrchestratorError::InvalidRequest("hold not found".into()))?;

        let status: String = row.try_get("status")?;
        Ok(OrchestratorHold {
            hold_id,
            session_id: SessionId::new(row.try_get("session_id")?),
            ticket_type_id: TicketTypeId::new(row.try_get("ticket_type_id")?),
            quantity: Quantity::new(row.try_get::<i32, _>("quantity")? as u32)
                .expect("stored quantity is always > 0"),
            customer_email: EmailAddress::parse(row.try_get::<String, _>("customer_email")?.as_str())
                .expect("stored email was valid at write time"),
            status: match status.as_str() {
                "active" => OrchestratorHoldStatus::Active,
                "expired" => OrchestratorHoldStatus::Expired,
                other => unreachable!("unexpected orchestrator hold status in storage: {other}"),
            },
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
