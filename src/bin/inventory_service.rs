//! ticketing-inventory-service: HTTP server exposing hold/release/commit
//! and availability reads (spec.md §6).

use std::sync::Arc;

use ticketing::config::Config;
use ticketing::inventory::{InventoryService, InventoryStore};
use ticketing::storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-inventory-service");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(InventoryStore::new(pool));
    store.init().await?;

    let service = InventoryService::new(store);
    let app = ticketing::inventory::http::router(service)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(%addr, "inventory service listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
