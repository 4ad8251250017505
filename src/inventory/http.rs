//! HTTP surface for the Inventory Service (spec.md §6).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{HoldId, Quantity, SessionId, TicketTypeId};

use super::error::InventoryError;
use super::service::InventoryService;

pub fn router(service: InventoryService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/inventory/hold", post(hold))
        .route("/inventory/release", post(release))
        .route("/inventory/commit", post(commit))
        .route("/inventory/items/:session_id/:ticket_type_id", get(availability))
        .with_state(service)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct HoldRequest {
    hold_id: Uuid,
    session_id: Uuid,
    ticket_type_id: Uuid,
    quantity: u32,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct HoldResponse {
    success: bool,
    available_quantity: u32,
}

async fn hold(
    State(service): State<InventoryService>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<HoldResponse>, InventoryError> {
    let quantity = Quantity::new(req.quantity).map_err(|e| InventoryError::InvalidRequest(e.to_string()))?;
    let available_quantity = service
        .hold(
            HoldId::new(req.hold_id),
            SessionId::new(req.session_id),
            TicketTypeId::new(req.ticket_type_id),
            quantity,
            req.expires_at,
        )
        .await?;
    Ok(Json(HoldResponse {
        success: true,
        available_quantity,
    }))
}

#[derive(Debug, Deserialize)]
struct HoldIdRequest {
    hold_id: Uuid,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn release(
    State(service): State<InventoryService>,
    Json(req): Json<HoldIdRequest>,
) -> Result<Json<SuccessResponse>, InventoryError> {
    service.release(HoldId::new(req.hold_id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn commit(
    State(service): State<InventoryService>,
    Json(req): Json<HoldIdRequest>,
) -> Result<Json<SuccessResponse>, InventoryError> {
    service.commit(HoldId::new(req.hold_id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    total_quantity: u32,
    available_quantity: u32,
    held_quantity: u32,
}

async fn availability(
    State(service): State<InventoryService>,
    Path((session_id, ticket_type_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AvailabilityResponse>, InventoryError> {
    let item = service
        .availability(SessionId::new(session_id), TicketTypeId::new(ticket_type_id))
        .await?;
    Ok(Json(AvailabilityResponse {
        total_quantity: item.total_quantity,
        available_quantity: item.available_quantity,
        held_quantity: item.held_quantity(),
    }))
}
