//! Public HTTP facade: `POST /api/holds` and `POST /api/checkout`
//! (spec.md §6).

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{EmailAddress, HoldId, Quantity, SessionId, TicketTypeId};

use super::client::{InventoryClient, OrderClient};
use super::error::OrchestratorError;
use super::store::OrchestratorHoldStore;

#[derive(Clone)]
pub struct OrchestratorState {
    pub store: Arc<OrchestratorHoldStore>,
    pub inventory: InventoryClient,
    pub orders: OrderClient,
    pub hold_ttl: std::time::Duration,
}

pub fn router(state: OrchestratorState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/holds", post(create_hold))
        .route("/api/checkout", post(checkout))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateHoldRequest {
    session_id: Uuid,
    ticket_type_id: Uuid,
    quantity: u32,
    customer_email: String,
}

#[derive(Debug, Serialize)]
struct CreateHoldResponse {
    hold_id: Uuid,
    expires_at: DateTime<Utc>,
}

async fn create_hold(
    State(state): State<OrchestratorState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<Json<CreateHoldResponse>, OrchestratorError> {
    let quantity =
        Quantity::new(req.quantity).map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))?;
    let customer_email = EmailAddress::parse(&req.customer_email)
        .map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))?;

    let hold_id = HoldId::new(Uuid::new_v4());
    let expires_at = Utc::now() + chrono::Duration::from_std(state.hold_ttl).expect("configured ttl fits in a chrono::Duration");

    state
        .inventory
        .hold(hold_id.get(), req.session_id, req.ticket_type_id, quantity.get(), expires_at)
        .await?;

    state
        .store
        .record_active(
            hold_id,
            SessionId::new(req.session_id),
            TicketTypeId::new(req.ticket_type_id),
            quantity,
            &customer_email,
            expires_at,
        )
        .await?;

    Ok(Json(CreateHoldResponse {
        hold_id: hold_id.get(),
        expires_at,
    }))
}

async fn checkout(
    State(state): State<OrchestratorState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrchestratorError::InvalidRequest("missing Idempotency-Key header".into()))?;

    let (status, body) = state.orders.create_order(idempotency_key, body).await?;
    Ok((status, Json(body)))
}
