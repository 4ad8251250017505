//! ticketing-order-service: HTTP server exposing order create/confirm/cancel
//! (spec.md §6).

use std::sync::Arc;

use ticketing::config::Config;
use ticketing::orders::{AlwaysSucceeds, OrderService, OrderStore};
use ticketing::storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-order-service");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(OrderStore::new(pool));
    store.init().await?;

    let service = OrderService::new(store, Arc::new(AlwaysSucceeds));
    let app = ticketing::orders::http::router(service)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(%addr, "order service listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
