//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::{FulfillmentPublisher, PaymentGateway};
use serde::Serialize;

use crate::routes::carts::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub broker: &'static str,
    pub carts_count: usize,
}

/// GET /health: returns service health and the number of live carts.
pub async fn check<P, F>(State(state): State<Arc<AppState<P, F>>>) -> Json<HealthResponse>
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let broker = if (state.broker_connected)() {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "healthy",
        broker,
        carts_count: state.coordinator.store().len().await,
    })
}
