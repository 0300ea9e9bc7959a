//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use saga::SagaError;
use saga::order_fulfillment::{STEP_AUTHORIZE_PAYMENT, STEP_PUBLISH_FULFILLMENT};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Path names no resource, including ids that do not parse.
    NotFound(String),
    /// Cart operation error.
    Cart(CartError),
    /// Checkout saga error.
    Saga(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Cart(err) => cart_error_to_response(&err),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = match message {
            Some(message) => serde_json::json!({ "error": error, "message": message }),
            None => serde_json::json!({ "error": error }),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn cart_error_to_response(err: &CartError) -> (StatusCode, String, Option<String>) {
    let status = match err {
        CartError::NotFound(_) => StatusCode::NOT_FOUND,
        CartError::InvalidQuantity { .. }
        | CartError::QuantityOverflow { .. }
        | CartError::EmptyCart => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string(), None)
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String, Option<String>) {
    match err {
        SagaError::Cart(cart_err) => cart_error_to_response(&cart_err),
        SagaError::Declined { message } => (
            StatusCode::PAYMENT_REQUIRED,
            "payment declined".to_string(),
            Some(message),
        ),
        SagaError::InvalidCredential(reason) => (
            StatusCode::BAD_REQUEST,
            "invalid payment credential".to_string(),
            Some(reason),
        ),
        SagaError::Upstream { step, reason } => {
            tracing::error!(step, %reason, "checkout collaborator failed");
            let error = match step {
                STEP_AUTHORIZE_PAYMENT => "payment authorization failed",
                STEP_PUBLISH_FULFILLMENT => "failed to send order to warehouse",
                _ => "checkout failed",
            };
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string(), None)
        }
        SagaError::Serialization(e) => {
            tracing::error!(error = %e, "failed to encode fulfillment order");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
                None,
            )
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
