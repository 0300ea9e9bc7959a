//! HTTP API for the shopping cart service.
//!
//! Provides cart endpoints and the checkout trigger, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::{InMemoryBroker, InMemoryPublisher};
use cart::CartStore;
use common::FULFILLMENT_QUEUE;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    CartCoordinator, FulfillmentPublisher, InMemoryPaymentGateway, PaymentGateway,
    QueueFulfillmentPublisher,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::carts::AppState;
use routes::metrics::MetricsState;

/// State wired to in-memory collaborators.
pub type InMemoryAppState =
    AppState<InMemoryPaymentGateway, QueueFulfillmentPublisher<InMemoryPublisher>>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<P, F>(state: Arc<AppState<P, F>>, metrics_handle: PrometheusHandle) -> Router
where
    P: PaymentGateway + 'static,
    F: FulfillmentPublisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            store: Arc::clone(state.coordinator.store()),
        });

    Router::new()
        .route("/health", get(routes::health::check::<P, F>))
        .route("/create", post(routes::carts::create::<P, F>))
        .route("/cart/{id}", get(routes::carts::get::<P, F>))
        .route("/cart/{id}/items", post(routes::carts::add_item::<P, F>))
        .route("/cart/{id}/checkout", post(routes::carts::checkout::<P, F>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around the given collaborators.
pub fn create_state<P, F>(
    payment: P,
    fulfillment: F,
    broker_connected: impl Fn() -> bool + Send + Sync + 'static,
) -> Arc<AppState<P, F>>
where
    P: PaymentGateway,
    F: FulfillmentPublisher,
{
    let store = Arc::new(CartStore::new());
    Arc::new(AppState {
        coordinator: CartCoordinator::new(store, payment, fulfillment),
        broker_connected: Box::new(broker_connected),
    })
}

/// Creates application state backed by an in-memory payment gateway and broker.
///
/// Returns the gateway and broker handles so callers can script outcomes and
/// inspect published fulfillment orders.
pub fn create_default_state() -> (Arc<InMemoryAppState>, InMemoryPaymentGateway, InMemoryBroker) {
    let broker = InMemoryBroker::new();
    broker.declare_queue(FULFILLMENT_QUEUE);
    let payment = InMemoryPaymentGateway::new();

    let state = create_state(
        payment.clone(),
        QueueFulfillmentPublisher::new(broker.publisher(FULFILLMENT_QUEUE)),
        || true,
    );

    (state, payment, broker)
}
