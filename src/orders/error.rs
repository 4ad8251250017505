//! Errors returned by the Order Service, and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found")]
    OrderNotFound,

    #[error("invalid state transition")]
    InvalidStateTransition,

    #[error("payment failed")]
    PaymentFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            OrderError::OrderNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "order_not_found" }),
            ),
            OrderError::InvalidStateTransition => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_state" }),
            ),
            OrderError::PaymentFailed => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": "payment_failed" }),
            ),
            OrderError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_request", "message": message }),
            ),
            OrderError::Database(e) => {
                tracing::error!(error = %e, "order infrastructure failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal_error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
