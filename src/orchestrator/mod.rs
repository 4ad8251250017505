//! Orchestrator: the public-facing HTTP facade in front of the Inventory
//! and Order services, plus the thin hold mirror the expiry loop sweeps.
//! See spec.md §4.7, §6.

pub mod client;
pub mod error;
pub mod http;
pub mod model;
pub mod store;

pub use client::{InventoryClient, OrderClient};
pub use error::OrchestratorError;
pub use http::{router, OrchestratorState};
pub use model::{OrchestratorHold, OrchestratorHoldStatus};
pub use store::OrchestratorHoldStore;
