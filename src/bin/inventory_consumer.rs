//! ticketing-inventory-consumer: subscribes to `order.confirmed` and
//! `hold.expired`, committing or releasing the referenced hold (spec.md §4.6).

use std::sync::Arc;

use ticketing::bus::amqp::{consume_with_reconnect, AmqpTopology};
use ticketing::config::Config;
use ticketing::consumer::inventory_consumer::InventoryEventHandler;
use ticketing::consumer::{init_consumed_events_table, ConsumerRuntime};
use ticketing::inventory::InventoryStore;
use ticketing::storage;
use tracing::info;

const QUEUE_NAME: &str = "inventory_consumer";
const ROUTING_KEYS: &[&str] = &["order.confirmed", "hold.expired"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-inventory-consumer");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(InventoryStore::new(pool.clone()));
    store.init().await?;
    init_consumed_events_table(&pool).await?;

    let handler = InventoryEventHandler::new(store);
    let runtime = Arc::new(ConsumerRuntime::new(pool, handler, config.broker.retry_cap));

    let topology = AmqpTopology {
        amqp_url: config.broker.url.clone(),
        exchange: config.broker.exchange.clone(),
        dlx_exchange: config.broker.dlx_exchange.clone(),
    };
    let amqp_cfg = deadpool_lapin::Config {
        url: Some(topology.amqp_url.clone()),
        ..Default::default()
    };
    let pool_lapin = amqp_cfg.create_pool(Some(deadpool_lapin::Runtime::Tokio1))?;

    consume_with_reconnect(
        &pool_lapin,
        &topology,
        QUEUE_NAME,
        ROUTING_KEYS,
        config.broker.prefetch,
        move |delivery| {
            let runtime = runtime.clone();
            async move { runtime.on_delivery(delivery).await }
        },
    )
    .await
}
