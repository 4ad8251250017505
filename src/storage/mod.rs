//! Shared Postgres connection pooling.
//!
//! Each domain store ([`crate::inventory::InventoryStore`],
//! [`crate::orders::OrderStore`], [`crate::orchestrator::OrchestratorHoldStore`])
//! owns its own table schema and `init()`; this module only hands out the
//! pooled connection they and the consumer runtime share.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect_postgres(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
