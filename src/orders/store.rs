//! Postgres-backed order store.

use sqlx::{PgPool, Row};

use crate::domain::{EmailAddress, HoldId, IdempotencyKey, Money, OrderId, Quantity, SessionId, TicketTypeId};
use crate::outbox::{self, NewOutboxRecord};

use super::error::OrderError;
use super::model::{Order, OrderItem, OrderStatus, Payment, PaymentStatus};
use super::payment::PaymentGateway;

const OUTBOX_TABLE: &str = "order_outbox";

/// One order line as supplied by the caller, pre-validation.
pub struct NewOrderItem {
    pub session_id: SessionId,
    pub ticket_type_id: TicketTypeId,
    pub quantity: Quantity,
    pub unit_price: Money,
}

pub struct OrderStore {
    pool: PgPool,
}

impl OrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders (
                order_id UUID PRIMARY KEY,
                customer_email TEXT NOT NULL,
                status TEXT NOT NULL,
                total_amount BIGINT NOT NULL,
                idempotency_key UUID NOT NULL UNIQUE,
                hold_id UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS order_items (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                order_id UUID NOT NULL REFERENCES orders(order_id),
                session_id UUID NOT NULL,
                ticket_type_id UUID NOT NULL,
                quantity INT NOT NULL,
                unit_price BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS payments (
                order_id UUID PRIMARY KEY REFERENCES orders(order_id),
                status TEXT NOT NULL,
                amount BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        outbox::init_table(&self.pool, OUTBOX_TABLE).await?;
        Ok(())
    }

    /// Create (spec.md §4.3). Idempotent by `idempotency_key`: a repeat call
    /// returns the existing order and `is_new = false`, with no further
    /// writes.
    pub async fn create(
        &self,
        idempotency_key: IdempotencyKey,
        customer_email: EmailAddress,
        hold_id: HoldId,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, bool), OrderError> {
        let mut total = Money::ZERO;
        for item in &items {
            let line_total = item
                .unit_price
                .checked_mul_quantity(item.quantity)
                .map_err(|e| OrderError::InvalidRequest(e.to_string()))?;
            total = total
                .checked_add(line_total)
                .map_err(|e| OrderError::InvalidRequest(e.to_string()))?;
        }

        let order_id = OrderId::new(uuid::Uuid::new_v4());
        let mut tx = self.pool.begin().await?;

        // ON CONFLICT DO NOTHING rather than check-then-insert: two racing
        // transactions with the same idempotency key both reach this
        // statement, but Postgres serializes them on the unique index entry,
        // so the loser's statement only returns once the winner has
        // committed (or rolled back) — by the time we see 0 rows affected,
        // the winner's row is guaranteed visible.
        let inserted = sqlx::query(
            "INSERT INTO orders (order_id, customer_email, status, total_amount, idempotency_key, hold_id)
             VALUES ($1, $2, 'pending', $3, $4, $5)
             ON CONFLICT (idempotency_key) DO NOTHING",
        )
        .bind(order_id.get())
        .bind(customer_email.as_str())
        .bind(total.minor_units())
        .bind(idempotency_key.get())
        .bind(hold_id.get())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.commit().await?;
            let existing = sqlx::query("SELECT order_id FROM orders WHERE idempotency_key = $1")
                .bind(idempotency_key.get())
                .fetch_one(&self.pool)
                .await?;
            let existing_id: uuid::Uuid = existing.try_get("order_id")?;
            let order = self.get(OrderId::new(existing_id)).await?;
            return Ok((order, false));
        }

        for item in &items {
            sqlx::query(
                "INSERT INTO order_items (order_id, session_id, ticket_type_id, quantity, unit_price)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id.get())
            .bind(item.session_id.get())
            .bind(item.ticket_type_id.get())
            .bind(item.quantity.get() as i32)
            .bind(item.unit_price.minor_units())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO payments (order_id, status, amount) VALUES ($1, 'pending', $2)")
            .bind(order_id.get())
            .bind(total.minor_units())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let order = self.get(order_id).await?;
        Ok((order, true))
    }

    /// Confirm (spec.md §4.3): lock the order row, and only once the lock is
    /// held — so no second confirm can observe `pending` and charge again —
    /// decide whether to call the payment gateway at all.
    pub async fn confirm(
        &self,
        order_id: OrderId,
        payments: &(dyn PaymentGateway),
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status, total_amount FROM orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id.get())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let status: String = row.try_get("status")?;

        match status.as_str() {
            "confirmed" => {
                tx.commit().await?;
            }
            "cancelled" => {
                tx.rollback().await?;
                return Err(OrderError::InvalidStateTransition);
            }
            "pending" => {
                let total_amount = Money::from_minor_units(row.try_get("total_amount")?)
                    .expect("stored amount is always >= 0");
                let payment_succeeded = payments.charge(order_id, total_amount).await;

                if !payment_succeeded {
                    sqlx::query("UPDATE payments SET status = 'failed', updated_at = now() WHERE order_id = $1")
                        .bind(order_id.get())
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                    return Err(OrderError::PaymentFailed);
                }

                sqlx::query("UPDATE payments SET status = 'succeeded', updated_at = now() WHERE order_id = $1")
                    .bind(order_id.get())
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE orders SET status = 'confirmed', updated_at = now() WHERE order_id = $1")
                    .bind(order_id.get())
                    .execute(&mut *tx)
                    .await?;

                let hold_row = sqlx::query("SELECT hold_id FROM orders WHERE order_id = $1")
                    .bind(order_id.get())
                    .fetch_one(&mut *tx)
                    .await?;
                let hold_id: uuid::Uuid = hold_row.try_get("hold_id")?;

                let payload = serde_json::json!({ "order_id": order_id.get(), "hold_id": hold_id });
                outbox::insert_in_tx(
                    &mut tx,
                    OUTBOX_TABLE,
                    &NewOutboxRecord::new("order.confirmed", order_id.get(), payload),
                )
                .await?;

                tx.commit().await?;
            }
            other => unreachable!("unexpected order status in storage: {other}"),
        }

        self.get(order_id).await
    }

    /// Cancel (spec.md §4.3).
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
            .bind(order_id.get())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let status: String = row.try_get("status")?;

        match status.as_str() {
            "cancelled" => {
                tx.commit().await?;
            }
            "confirmed" => {
                tx.rollback().await?;
                return Err(OrderError::InvalidStateTransition);
            }
            "pending" => {
                sqlx::query("UPDATE orders SET status = 'cancelled', updated_at = now() WHERE order_id = $1")
                    .bind(order_id.get())
                    .execute(&mut *tx)
                    .await?;

                let payload = serde_json::json!({ "order_id": order_id.get() });
                outbox::insert_in_tx(
                    &mut tx,
                    OUTBOX_TABLE,
                    &NewOutboxRecord::new("order.cancelled", order_id.get(), payload),
                )
                .await?;

                tx.commit().await?;
            }
            other => unreachable!("unexpected order status in storage: {other}"),
        }

        self.get(order_id).await
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let row = sqlx::query(
            "SELECT order_id, customer_email, status, total_amount, idempotency_key, hold_id, created_at, updated_at
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderError::OrderNotFound)?;

        let item_rows = sqlx::query(
            "SELECT session_id, ticket_type_id, quantity, unit_price FROM order_items WHERE order_id = $1",
        )
        .bind(order_id.get())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(|r| OrderItem {
                session_id: SessionId::new(r.get("session_id")),
                ticket_type_id: TicketTypeId::new(r.get("ticket_type_id")),
                quantity: Quantity::new(r.get::<i32, _>("quantity") as u32)
                    .expect("stored quantity is always > 0"),
                unit_price: Money::from_minor_units(r.get("unit_price")).expect("stored amount is always >= 0"),
            })
            .collect();

        let status: String = row.try_get("status")?;
        Ok(Order {
            order_id,
            customer_email: EmailAddress::parse(row.try_get::<String, _>("customer_email")?.as_str())
                .expect("stored email was valid at write time"),
            status: match status.as_str() {
                "pending" => OrderStatus::Pending,
                "confirmed" => OrderStatus::Confirmed,
                "cancelled" => OrderStatus::Cancelled,
                other => unreachable!("unexpected order status in storage: {other}"),
            },
            total_amount: Money::from_minor_units(row.try_get("total_amount")?)
                .expect("stored amount is always >= 0"),
            idempotency_key: IdempotencyKey::new(row.try_get("idempotency_key")?),
            hold_id: HoldId::new(row.try_get("hold_id")?),
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    #[cfg(test)]
    pub async fn get_payment(&self, order_id: OrderId) -> Result<Payment, OrderError> {
        let row = sqlx::query("SELECT order_id, status, amount FROM payments WHERE order_id = $1")
            .bind(order_id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let status: String = row.try_get("status")?;
        Ok(Payment {
            order_id,
            status: match status.as_str() {
                "pending" => PaymentStatus::Pending,
                "succeeded" => PaymentStatus::Succeeded,
                "failed" => PaymentStatus::Failed,
                other => unreachable!("unexpected payment status in storage: {other}"),
            },
            amount: Money::from_minor_units(row.try_get("amount")?).expect("stored amount is always >= 0"),
        })
    }
}
