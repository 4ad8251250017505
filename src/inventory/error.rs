//! Errors returned by the Inventory Service, and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("insufficient inventory: {available} available, {requested} requested")]
    InsufficientInventory { available: u32, requested: u32 },

    #[error("hold not found")]
    HoldNotFound,

    #[error("inventory item not found")]
    ItemNotFound,

    #[error("invalid state transition")]
    InvalidStateTransition,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            InventoryError::InsufficientInventory { available, .. } => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": "insufficient_inventory",
                    "available_quantity": available,
                }),
            ),
            InventoryError::HoldNotFound | InventoryError::ItemNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": "not_found" }),
            ),
            InventoryError::InvalidStateTransition => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": "invalid_state_transition" }),
            ),
            InventoryError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": "invalid_request", "message": message }),
            ),
            InventoryError::Database(e) => {
                tracing::error!(error = %e, "inventory infrastructure failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "internal_error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
