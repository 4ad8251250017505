//! HTTP surface for the Order Service (spec.md §6).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{EmailAddress, HoldId, IdempotencyKey, Money, Quantity, SessionId, TicketTypeId};

use super::error::OrderError;
use super::model::Order;
use super::service::OrderService;
use super::store::NewOrderItem;

pub fn router(service: OrderService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/orders", post(create))
        .route("/orders/:id/confirm", post(confirm))
        .route("/orders/:id/cancel", post(cancel))
        .route("/orders/:id", get(get_order))
        .with_state(service)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateOrderItemRequest {
    session_id: Uuid,
    ticket_type_id: Uuid,
    quantity: u32,
    unit_price: i64,
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    customer_email: String,
    hold_id: Uuid,
    items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Serialize)]
struct OrderEnvelope {
    order_id: Uuid,
    status: String,
    total_amount: i64,
    hold_id: Uuid,
    is_new: bool,
}

impl OrderEnvelope {
    fn from_order(order: Order, is_new: bool) -> Self {
        Self {
            order_id: order.order_id.get(),
            status: order.status.to_string(),
            total_amount: order.total_amount.minor_units(),
            hold_id: order.hold_id.get(),
            is_new,
        }
    }
}

async fn create(
    State(service): State<OrderService>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderEnvelope>), OrderError> {
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrderError::InvalidRequest("missing Idempotency-Key header".into()))?;
    let idempotency_key = IdempotencyKey::parse(idempotency_key)
        .map_err(|e| OrderError::InvalidRequest(e.to_string()))?;

    let customer_email =
        EmailAddress::parse(&req.customer_email).map_err(|e| OrderError::InvalidRequest(e.to_string()))?;

    let mut items = Vec::with_capacity(req.items.len());
    for item in req.items {
        let quantity =
            Quantity::new(item.quantity).map_err(|e| OrderError::InvalidRequest(e.to_string()))?;
        let unit_price =
            Money::from_minor_units(item.unit_price).map_err(|e| OrderError::InvalidRequest(e.to_string()))?;
        items.push(NewOrderItem {
            session_id: SessionId::new(item.session_id),
            ticket_type_id: TicketTypeId::new(item.ticket_type_id),
            quantity,
            unit_price,
        });
    }

    let (order, is_new) = service
        .create(idempotency_key, customer_email, HoldId::new(req.hold_id), items)
        .await?;

    let status = if is_new { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(OrderEnvelope::from_order(order, is_new))))
}

async fn confirm(
    State(service): State<OrderService>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderEnvelope>, OrderError> {
    let order = service.confirm(crate::domain::OrderId::new(id)).await?;
    Ok(Json(OrderEnvelope::from_order(order, false)))
}

async fn cancel(
    State(service): State<OrderService>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderEnvelope>, OrderError> {
    let order = service.cancel(crate::domain::OrderId::new(id)).await?;
    Ok(Json(OrderEnvelope::from_order(order, false)))
}

async fn get_order(
    State(service): State<OrderService>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderEnvelope>, OrderError> {
    let order = service.get(crate::domain::OrderId::new(id)).await?;
    Ok(Json(OrderEnvelope::from_order(order, false)))
}
