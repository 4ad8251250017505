//! Integration tests against a real PostgreSQL instance, covering the
//! concurrency and idempotency properties spec.md §8 calls out for the
//! Inventory and Order Cores — the two subsystems whose correctness lives
//! entirely in `FOR UPDATE` row locking that an in-memory SQLite pool
//! cannot exercise. Each test starts its own disposable container, so
//! tests are free to run concurrently.
//!
//! Run with: cargo test --test postgres_integration -- --nocapture
//! Requires a working Docker (or Docker-compatible) daemon.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

use ticketing::domain::{EmailAddress, HoldId, IdempotencyKey, Money, Quantity, SessionId, TicketTypeId};
use ticketing::inventory::{InventoryError, InventoryStore};
use ticketing::orders::store::{NewOrderItem, OrderStore};
use ticketing::storage;

/// Starts a disposable PostgreSQL container and returns a connected pool.
/// The container is kept alive by the caller for as long as the pool is
/// used; dropping it stops PostgreSQL.
async fn start_postgres() -> (ContainerAsync<GenericImage>, sqlx::PgPool) {
    let image = GenericImage::new("postgres", "16")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stdout(
            "database system is ready to accept connections",
        ));

    let container = image
        .with_env_var("POSTGRES_USER", "ticketing")
        .with_env_var("POSTGRES_PASSWORD", "ticketing")
        .with_env_var("POSTGRES_DB", "ticketing")
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("failed to start postgres container");

    // Postgres logs its "ready" message once before the final startup pass;
    // give it a moment to actually start accepting connections.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let host_port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");
    let host = container.get_host().await.expect("failed to get container host");
    let url = format!("postgres://ticketing:ticketing@{host}:{host_port}/ticketing");

    let pool = storage::connect_postgres(&url, 10)
        .await
        .expect("failed to connect to postgres");
    (container, pool)
}

fn some_email() -> EmailAddress {
    EmailAddress::parse("buyer@example.com").unwrap()
}

fn one_item(unit_price_minor_units: i64) -> Vec<NewOrderItem> {
    vec![NewOrderItem {
        session_id: SessionId::new(Uuid::new_v4()),
        ticket_type_id: TicketTypeId::new(Uuid::new_v4()),
        quantity: Quantity::new(1).unwrap(),
        unit_price: Money::from_minor_units(unit_price_minor_units).unwrap(),
    }]
}

/// spec.md §8 scenario 3: identical `hold` calls repeated serially apply
/// their effect at most once.
#[tokio::test]
async fn idempotent_hold_applies_at_most_once() {
    let (_container, pool) = start_postgres().await;
    let store = InventoryStore::new(pool);
    store.init().await.unwrap();

    let session_id = SessionId::new(Uuid::new_v4());
    let ticket_type_id = TicketTypeId::new(Uuid::new_v4());
    store.ensure_item(session_id, ticket_type_id, 10).await.unwrap();

    let hold_id = HoldId::new(Uuid::new_v4());
    let quantity = Quantity::new(1).unwrap();
    let expires_at = Utc::now() + chrono::Duration::seconds(600);

    for _ in 0..5 {
        store
            .hold(hold_id, session_id, ticket_type_id, quantity, expires_at)
            .await
            .unwrap();
    }

    let item = store.availability(session_id, ticket_type_id).await.unwrap();
    assert_eq!(item.available_quantity, 9, "five identical holds must decrement availability exactly once");
}

/// spec.md §8 scenario 2: 20 concurrent holds of quantity 1 against
/// `total_quantity=10` must yield exactly 10 successes and 10
/// `INSUFFICIENT_INVENTORY` failures, never an oversell.
#[tokio::test]
async fn concurrent_holds_never_oversell() {
    let (_container, pool) = start_postgres().await;
    let store = Arc::new(InventoryStore::new(pool));
    store.init().await.unwrap();

    let session_id = SessionId::new(Uuid::new_v4());
    let ticket_type_id = TicketTypeId::new(Uuid::new_v4());
    store.ensure_item(session_id, ticket_type_id, 10).await.unwrap();

    let expires_at = Utc::now() + chrono::Duration::seconds(600);
    let quantity = Quantity::new(1).unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            let hold_id = HoldId::new(Uuid::new_v4());
            tokio::spawn(async move {
                store.hold(hold_id, session_id, ticket_type_id, quantity, expires_at).await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(InventoryError::InsufficientInventory { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(insufficient, 10);

    let item = store.availability(session_id, ticket_type_id).await.unwrap();
    assert_eq!(item.available_quantity, 0);
}

/// spec.md §8 scenario 5: repeating `POST /orders` with the same
/// `Idempotency-Key` always returns the original order, serially.
#[tokio::test]
async fn duplicate_order_idempotency_returns_same_order() {
    let (_container, pool) = start_postgres().await;
    let store = OrderStore::new(pool);
    store.init().await.unwrap();

    let idempotency_key = IdempotencyKey::new(Uuid::new_v4());
    let hold_id = HoldId::new(Uuid::new_v4());

    let (first, is_new) = store
        .create(idempotency_key, some_email(), hold_id, one_item(5000))
        .await
        .unwrap();
    assert!(is_new);

    for _ in 0..20 {
        let (order, is_new) = store
            .create(idempotency_key, some_email(), hold_id, one_item(5000))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(order.order_id, first.order_id);
    }
}

/// The concurrent counterpart of the above: racing `create` calls on the
/// same idempotency key must still converge on exactly one order row,
/// confirming the `ON CONFLICT DO NOTHING` path never lets two callers
/// each believe they created the order.
#[tokio::test]
async fn concurrent_duplicate_order_creates_converge_on_one_row() {
    let (_container, pool) = start_postgres().await;
    let store = Arc::new(OrderStore::new(pool));
    store.init().await.unwrap();

    let idempotency_key = IdempotencyKey::new(Uuid::new_v4());
    let hold_id = HoldId::new(Uuid::new_v4());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store.create(idempotency_key, some_email(), hold_id, one_item(1000)).await
            })
        })
        .collect();

    let mut order_ids = HashSet::new();
    for handle in handles {
        let (order, _) = handle.await.unwrap().unwrap();
        order_ids.insert(order.order_id);
    }

    assert_eq!(order_ids.len(), 1, "racing creates on one idempotency key must converge on one order");
}

/// Hold round trip (spec.md §8 round-trip laws): `hold` then `release`
/// restores availability to its pre-hold value.
#[tokio::test]
async fn hold_then_release_restores_availability() {
    let (_container, pool) = start_postgres().await;
    let store = InventoryStore::new(pool);
    store.init().await.unwrap();

    let session_id = SessionId::new(Uuid::new_v4());
    let ticket_type_id = TicketTypeId::new(Uuid::new_v4());
    store.ensure_item(session_id, ticket_type_id, 10).await.unwrap();

    let hold_id = HoldId::new(Uuid::new_v4());
    let quantity = Quantity::new(3).unwrap();
    let expires_at = Utc::now() + chrono::Duration::seconds(600);

    store
        .hold(hold_id, session_id, ticket_type_id, quantity, expires_at)
        .await
        .unwrap();
    assert_eq!(
        store.availability(session_id, ticket_type_id).await.unwrap().available_quantity,
        7
    );

    store.release(hold_id).await.unwrap();
    assert_eq!(
        store.availability(session_id, ticket_type_id).await.unwrap().available_quantity,
        10
    );

    // Released is terminal: a second release is an idempotent no-op, not
    // an error and not a second refund.
    store.release(hold_id).await.unwrap();
    assert_eq!(
        store.availability(session_id, ticket_type_id).await.unwrap().available_quantity,
        10
    );
}
