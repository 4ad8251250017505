//! ticketing-outbox-publisher: polls every writer's outbox table and
//! publishes unpublished rows to the broker (spec.md §4.4).
//!
//! One process drains all three outboxes (inventory, order, orchestrator)
//! concurrently — they share nothing but the connection pool and the bus.

use std::sync::Arc;

use ticketing::bus::amqp::{AmqpEventBus, AmqpTopology};
use ticketing::bus::EventBus;
use ticketing::config::Config;
use ticketing::outbox::OutboxPublisher;
use ticketing::storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ticketing::telemetry::init();

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    info!("starting ticketing-outbox-publisher");

    let pool = storage::connect_postgres(&config.database.url, config.database.max_connections).await?;

    let topology = AmqpTopology {
        amqp_url: config.broker.url.clone(),
        exchange: config.broker.exchange.clone(),
        dlx_exchange: config.broker.dlx_exchange.clone(),
    };
    let bus: Arc<dyn EventBus> = Arc::new(AmqpEventBus::connect(topology).await?);

    let publishers = ["inventory_outbox", "order_outbox", "orchestrator_outbox"]
        .into_iter()
        .map(|table| {
            OutboxPublisher::new(
                pool.clone(),
                bus.clone(),
                table,
                config.outbox_poll_interval(),
                config.outbox.batch_size,
            )
        })
        .collect::<Vec<_>>();

    let mut handles = Vec::with_capacity(publishers.len());
    for publisher in publishers {
        handles.push(tokio::spawn(async move { publisher.run().await }));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
