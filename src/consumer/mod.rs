//! Generic consumer runtime: dedup, bounded retry, and dead-letter routing
//! shared by every queue subscriber. See spec.md §4.6.
//!
//! Dedup is enforced by a `consumed_events` row inserted in the *same*
//! transaction as the handler's effect — a crash between the effect commit
//! and the ack can only cause a redelivery that the dedup check turns into
//! a no-op, never a double effect.

pub mod inventory_consumer;

use std::collections::HashMap;
use std::sync::Mutex;

use sqlx::{PgPool, Row};

use crate::bus::{BusError, Delivery, EventEnvelope};
use crate::dlq::DeadLetterReason;

/// What a handler's attempt produced.
pub enum HandlerOutcome {
    /// Effect applied (or was already applied — handlers are themselves
    /// idempotent at the domain level); the runtime records the dedup row.
    Applied,
    /// Failed in a way a retry might resolve (e.g. a transient database
    /// error). Retried up to `retry_cap` times before dead-lettering.
    Transient(String),
    /// Failed in a way no retry will fix (e.g. an unknown event type).
    /// Dead-lettered immediately.
    Permanent(String),
}

/// A named consumer's business logic. Implementations run inside the
/// transaction the runtime opens, so their effect and the dedup row commit
/// atomically together.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name identifying this consumer for dedup bookkeeping and logs.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        envelope: &EventEnvelope,
    ) -> HandlerOutcome;
}

/// Creates the `consumed_events` table used for cross-consumer dedup.
pub async fn init_consumed_events_table(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS consumed_events (
            consumer_name TEXT NOT NULL,
            event_id UUID NOT NULL,
            consumed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (consumer_name, event_id)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Drives one handler against a queue's deliveries: dedup check, handler
/// invocation, dedup-row insert, and retry/dead-letter decisions, all keyed
/// off an in-process attempt counter (the broker does not give us a
/// reliable cross-redelivery retry count without its own bookkeeping, so
/// the runtime keeps one keyed by event id instead).
pub struct ConsumerRuntime<H: EventHandler> {
    pool: PgPool,
    handler: H,
    retry_cap: u32,
    attempts: Mutex<HashMap<uuid::Uuid, u32>>,
}

impl<H: EventHandler> ConsumerRuntime<H> {
    pub fn new(pool: PgPool, handler: H, retry_cap: u32) -> Self {
        Self {
            pool,
            handler,
            retry_cap,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Handles one delivery end to end. Never panics on a handler failure;
    /// the message is always acked, nacked for requeue, or dead-lettered.
    pub async fn on_delivery(&self, delivery: Box<dyn Delivery>) {
        let event_id = delivery.envelope().event_id;
        let event_type = delivery.envelope().event_type.clone();

        match self.try_apply(delivery.envelope()).await {
            HandlerOutcome::Applied => {
                self.forget(event_id);
                if let Err(e) = delivery.ack().await {
                    tracing::error!(error = %e, event_id = %event_id, "failed to ack delivery");
                }
            }
            HandlerOutcome::Permanent(reason) => {
                tracing::warn!(
                    event_id = %event_id, event_type, reason,
                    dlq_reason = %DeadLetterReason::BusinessPermanentFailure,
                    "permanent failure, dead-lettering"
                );
                self.forget(event_id);
                let _ = delivery.nack_dead_letter().await;
            }
            HandlerOutcome::Transient(reason) => {
                let attempt = self.record_attempt(event_id);
                if attempt >= self.retry_cap {
                    tracing::warn!(
                        event_id = %event_id, event_type, reason, attempt, retry_cap = self.retry_cap,
                        dlq_reason = %DeadLetterReason::RetriesExhausted,
                        "retry budget exhausted, dead-lettering"
                    );
                    self.forget(event_id);
                    let _ = delivery.nack_dead_letter().await;
                } else {
                    tracing::warn!(event_id = %event_id, event_type, reason, attempt, "transient failure, requeuing");
                    let _: Result<(), BusError> = delivery.nack_requeue().await;
                }
            }
        }
    }

    async fn try_apply(&self, envelope: &EventEnvelope) -> HandlerOutcome {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return HandlerOutcome::Transient(e.to_string()),
        };

        let already_consumed = match sqlx::query(
            "SELECT 1 FROM consumed_events WHERE consumer_name = $1 AND event_id = $2",
        )
        .bind(self.handler.name())
        .bind(envelope.event_id)
        .fetch_optional(&mut *tx)
        .await
        {
            Ok(row) => row.is_some(),
            Err(e) => return HandlerOutcome::Transient(e.to_string()),
        };

        if already_consumed {
            return HandlerOutcome::Applied;
        }

        let outcome = self.handler.handle(&mut tx, envelope).await;
        if !matches!(outcome, HandlerOutcome::Applied) {
            return outcome;
        }

        if let Err(e) = sqlx::query(
            "INSERT INTO consumed_events (consumer_name, event_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(self.handler.name())
        .bind(envelope.event_id)
        .execute(&mut *tx)
        .await
        {
            return HandlerOutcome::Transient(e.to_string());
        }

        if let Err(e) = tx.commit().await {
            return HandlerOutcome::Transient(e.to_string());
        }

        HandlerOutcome::Applied
    }

    fn record_attempt(&self, event_id: uuid::Uuid) -> u32 {
        let mut attempts = self.attempts.lock().unwrap();
        let entry = attempts.entry(event_id).or_insert(0);
        *entry += 1;
        *entry
    }

    fn forget(&self, event_id: uuid::Uuid) {
        self.attempts.lock().unwrap().remove(&event_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysApplies;

    #[async_trait::async_trait]
    impl EventHandler for AlwaysApplies {
        fn name(&self) -> &'static str {
            "always_applies"
        }

        async fn handle(
            &self,
            _tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
            _envelope: &EventEnvelope,
        ) -> HandlerOutcome {
            HandlerOutcome::Applied
        }
    }

    #[test]
    fn attempt_counter_increments_and_forgets() {
        let runtime = ConsumerRuntime {
            pool: unreachable_pool(),
            handler: AlwaysApplies,
            retry_cap: 3,
            attempts: Mutex::new(HashMap::new()),
        };
        let id = uuid::Uuid::new_v4();
        assert_eq!(runtime.record_attempt(id), 1);
        assert_eq!(runtime.record_attempt(id), 2);
        runtime.forget(id);
        assert_eq!(runtime.record_attempt(id), 1);
    }

    fn unreachable_pool() -> PgPool {
        // Never connected to; this test only exercises the in-memory
        // attempt counter, not any database access.
        PgPool::connect_lazy("postgres://unused/unused").expect("lazy pool never dials out")
    }
}
