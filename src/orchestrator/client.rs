//! HTTP clients the orchestrator uses to call the Inventory and Order
//! services. Bounded timeouts turn a slow/unreachable collaborator into a
//! `503` for the caller rather than an indefinite hang (spec.md §5).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::OrchestratorError;

#[derive(Clone)]
pub struct InventoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl InventoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is always valid");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn hold(
        &self,
        hold_id: Uuid,
        session_id: Uuid,
        ticket_type_id: Uuid,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<u32, OrchestratorError> {
        #[derive(Serialize)]
        struct Request {
            hold_id: Uuid,
            session_id: Uuid,
            ticket_type_id: Uuid,
            quantity: u32,
            expires_at: DateTime<Utc>,
        }
        #[derive(Deserialize)]
        struct Response {
            available_quantity: u32,
        }

        let response = self
            .http
            .post(format!("{}/inventory/hold", self.base_url))
            .json(&Request {
                hold_id,
                session_id,
                ticket_type_id,
                quantity,
                expires_at,
            })
            .send()
            .await
            .map_err(|_| OrchestratorError::InventoryUnavailable)?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let body: Response = response
                    .json()
                    .await
                    .map_err(|_| OrchestratorError::InventoryUnavailable)?;
                Ok(body.available_quantity)
            }
            reqwest::StatusCode::CONFLICT => {
                #[derive(Deserialize)]
                struct Conflict {
                    available_quantity: u32,
                }
                let body: Conflict = response
                    .json()
                    .await
                    .map_err(|_| OrchestratorError::InventoryUnavailable)?;
                Err(OrchestratorError::InsufficientInventory {
                    available: body.available_quantity,
                    requested: quantity,
                })
            }
            _ => Err(OrchestratorError::InventoryUnavailable),
        }
    }
}

/// Thin proxy for `POST /api/checkout`: forwards the caller's body and
/// `Idempotency-Key` header to the Order Service's `/orders` endpoint and
/// relays its response body and status verbatim.
#[derive(Clone)]
pub struct OrderClient {
    http: reqwest::Client,
    base_url: String,
}

impl OrderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is always valid");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn create_order(
        &self,
        idempotency_key: &str,
        body: serde_json::Value,
    ) -> Result<(reqwest::StatusCode, serde_json::Value), OrchestratorError> {
        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|_| OrchestratorError::OrderServiceUnavailable)?;

        let status = response.status();
        let body = response
            .json()
            .await
            .map_err(|_| OrchestratorError::OrderServiceUnavailable)?;
        Ok((status, body))
    }
}
