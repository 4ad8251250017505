//! ticketing-expiry-loop: periodic sweep of overdue holds in the
//! orchestrator's hold mirror (spec.md §4.7).

use std::sync::Arc;

use ticketing::config::Config;
use ticketing::expiry::ExpiryLoop;
use ticketing::orchestrator::OrchestratorHoldStore;
use ticketing::storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-expiry-loop");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(OrchestratorHoldStore::new(pool));
    store.init().await?;

    ExpiryLoop::new(store, config.expiry_interval()).run().await
}
