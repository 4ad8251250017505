//! AMQP (RabbitMQ) event bus implementation.
//!
//! One durable topic exchange (`ticketing.events`) carries all domain
//! events; routing key = `event_type`. Publishing reuses a pooled channel;
//! consuming reconnects with exponential backoff and jitter so a broker
//! restart is transparent to the consumer runtime above it.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use deadpool_lapin::{Config as PoolConfig, Pool, Runtime};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ExchangeKind};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use crate::dlq::{dlq_queue_name, DeadLetterReason};

use super::{BusError, Delivery, EventBus, EventEnvelope};

/// Connection + exchange topology shared by publisher and consumer sides.
#[derive(Debug, Clone)]
pub struct AmqpTopology {
    pub amqp_url: String,
    pub exchange: String,
    pub dlx_exchange: String,
}

/// Publishes `EventEnvelope`s to the topic exchange as JSON.
pub struct AmqpEventBus {
    pool: Pool,
    topology: AmqpTopology,
}

impl AmqpEventBus {
    pub async fn connect(topology: AmqpTopology) -> Result<Self, BusError> {
        let cfg = PoolConfig {
            url: Some(topology.amqp_url.clone()),
            ..Default::default()
        };
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let bus = Self { pool, topology };
        bus.declare_topology().await?;
        Ok(bus)
    }

    async fn declare_topology(&self) -> Result<(), BusError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        channel
            .exchange_declare(
                &self.topology.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        channel
            .exchange_declare(
                &self.topology.dlx_exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EventBus for AmqpEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BusError> {
        let body = serde_json::to_vec(envelope)
            .map_err(|e| BusError::PublishFailed(format!("serialize: {e}")))?;

        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_message_id(envelope.event_id.to_string().into());

        channel
            .basic_publish(
                &self.topology.exchange,
                &envelope.event_type,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?;

        Ok(())
    }
}

/// A delivered AMQP message, wrapping the raw `lapin::message::Delivery`.
/// Dead-lettering is handled by the queue's `x-dead-letter-exchange`
/// argument, so a bare `nack(requeue=false)` is all this type needs to do.
pub struct AmqpDelivery {
    envelope: EventEnvelope,
    redelivery_count: u32,
    inner: lapin::message::Delivery,
}

#[async_trait]
impl Delivery for AmqpDelivery {
    fn envelope(&self) -> &EventEnvelope {
        &self.envelope
    }

    fn redelivery_count(&self) -> u32 {
        self.redelivery_count
    }

    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        self.inner
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))
    }

    async fn nack_requeue(self: Box<Self>) -> Result<(), BusError> {
        self.inner
            .nack(BasicNackOptions {
                requeue: true,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))
    }

    async fn nack_dead_letter(self: Box<Self>) -> Result<(), BusError> {
        self.inner
            .nack(BasicNackOptions {
                requeue: false,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?;
        Ok(())
    }
}

/// Declares a durable consumer queue bound to the given routing keys and
/// consumes from it, reconnecting with exponential backoff + jitter on any
/// channel/connection failure. `on_delivery` is invoked once per message;
/// returning from it acks/nacks via the `Delivery` handle it receives.
pub async fn consume_with_reconnect<F, Fut>(
    pool: &Pool,
    topology: &AmqpTopology,
    queue_name: &str,
    routing_keys: &[&str],
    prefetch: u16,
    on_delivery: F,
) -> !
where
    F: Fn(Box<dyn Delivery>) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    loop {
        let attempt = {
            let pool = pool.clone();
            let topology = topology.clone();
            let queue_name = queue_name.to_string();
            let routing_keys: Vec<String> = routing_keys.iter().map(|s| s.to_string()).collect();
            let on_delivery = on_delivery.clone();
            move || {
                let pool = pool.clone();
                let topology = topology.clone();
                let queue_name = queue_name.clone();
                let routing_keys = routing_keys.clone();
                let on_delivery = on_delivery.clone();
                async move {
                    run_consume_loop(&pool, &topology, &queue_name, &routing_keys, prefetch, on_delivery)
                        .await
                }
            }
        };

        let backoff = ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(30));

        if let Err(e) = attempt.retry(backoff).notify(|err, dur| {
            warn!(error = %err, retry_in = ?dur, "amqp consumer disconnected, reconnecting");
        }).await {
            error!(error = %e, "amqp consumer loop exited unexpectedly, restarting from scratch");
        }
    }
}

async fn run_consume_loop<F, Fut>(
    pool: &Pool,
    topology: &AmqpTopology,
    queue_name: &str,
    routing_keys: &[String],
    prefetch: u16,
    on_delivery: F,
) -> Result<(), BusError>
where
    F: Fn(Box<dyn Delivery>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ()> + Send,
{
    let conn = pool.get().await.map_err(|e| BusError::Connection(e.to_string()))?;
    let channel = conn
        .create_channel()
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    channel
        .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    let dlq_name = dlq_queue_name(queue_name);
    let mut dlq_args = FieldTable::default();
    dlq_args.insert("x-dead-letter-exchange".into(), topology.dlx_exchange.clone().into());
    dlq_args.insert("x-dead-letter-routing-key".into(), dlq_name.clone().into());

    channel
        .queue_declare(
            &dlq_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    channel
        .queue_bind(
            &dlq_name,
            &topology.dlx_exchange,
            &dlq_name,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            dlq_args,
        )
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    for key in routing_keys {
        channel
            .queue_bind(
                queue_name,
                &topology.exchange,
                key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
    }

    let mut consumer = channel
        .basic_consume(
            queue_name,
            "ticketing-consumer",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Connection(e.to_string()))?;

    info!(queue = queue_name, "consumer connected");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.map_err(|e| BusError::Connection(e.to_string()))?;
        let envelope: EventEnvelope = match serde_json::from_slice(&delivery.data) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, dlq_reason = %DeadLetterReason::MalformedEnvelope, "dropping malformed envelope to dead-letter");
                let _ = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
                continue;
            }
        };

        // No `x-death` header yet on first delivery to this queue, and lapin
        // does not expose a running count beyond that header's own array
        // length, so there is nothing reliable to report here.
        let redelivery_count = 0;

        let wrapped = Box::new(AmqpDelivery {
            envelope,
            redelivery_count,
            inner: delivery,
        });
        on_delivery(wrapped).await;
    }

    Ok(())
}
