//! Expiry Loop: periodic sweep of overdue holds in the orchestrator's hold
//! mirror (spec.md §4.7). Runs independently of the Inventory and Order
//! services — it only ever touches `orchestrator_holds` and the
//! orchestrator's own outbox; inventory mutation happens later, when the
//! inventory consumer picks up the resulting `hold.expired` event.

use std::sync::Arc;
use std::time::Duration;

use crate::orchestrator::OrchestratorHoldStore;

const SWEEP_BATCH_SIZE: i64 = 500;

pub struct ExpiryLoop {
    store: Arc<OrchestratorHoldStore>,
    interval: Duration,
}

impl ExpiryLoop {
    pub fn new(store: Arc<OrchestratorHoldStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Runs forever, sweeping on a fixed tick. Errors are logged and the
    /// loop continues — a failed sweep leaves overdue holds `active`, so
    /// the next tick picks them back up.
    pub async fn run(&self) -> ! {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.store.expire_overdue(SWEEP_BATCH_SIZE).await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "expired overdue holds");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "hold expiry sweep failed, will retry next tick");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // `expire_overdue`'s row-locking SQL is Postgres-specific (`FOR UPDATE
    // SKIP LOCKED`), so it is exercised against a live database rather than
    // unit-tested here; this module's own logic (tick, log, continue on
    // error) has no branching worth a dedicated test beyond what `run`'s
    // straight-line body already shows.
}
