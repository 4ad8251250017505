//! ticketing-orchestrator: the public-facing HTTP facade (spec.md §6).

use std::sync::Arc;

use ticketing::config::Config;
use ticketing::orchestrator::{InventoryClient, OrchestratorHoldStore, OrchestratorState, OrderClient};
use ticketing::storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-orchestrator");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(OrchestratorHoldStore::new(pool));
    store.init().await?;

    let state = OrchestratorState {
        store,
        inventory: InventoryClient::new(
            config.client.inventory_service_url.clone(),
            config.inventory_call_timeout(),
        ),
        orders: OrderClient::new(
            config.client.order_service_url.clone(),
            config.inventory_call_timeout(),
        ),
        hold_ttl: config.hold_ttl(),
    };

    let app = ticketing::orchestrator::router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(%addr, "orchestrator listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
