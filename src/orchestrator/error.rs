//! Errors returned by the public orchestrator facade, and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("insufficient inventory: {available} available, {requested} requested")]
    InsufficientInventory { available: u32, requested: u32 },

    #[error("inventory service unavailable")]
    InventoryUnavailable,

    #[error("order service unavailable")]
    OrderServiceUnavailable,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            OrchestratorError::InsufficientInventory { available, .. } => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": "insufficient_inventory",
                    "available_quantity": available,
                }),
            ),
            OrchestratorError::InventoryUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": "inventory_service_unavailable" }),
            ),
            OrchestratorError::OrderServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": "order_service_unavailable" }),
            ),
            OrchestratorError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": "invalid_request", "message": message }),
            ),
            OrchestratorError::Database(e) => {
                tracing::error!(error = %e, "orchestrator infrastructure failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "internal_error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
