//! Cart service entry point.

use std::sync::Arc;

use api::config::Config;
use broker::{AmqpBroker, RetryPolicy, connect_with_retry};
use common::FULFILLMENT_QUEUE;
use saga::{HttpPaymentGateway, QueueFulfillmentPublisher};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect to the broker, retrying with backoff
    let broker = connect_with_retry(&RetryPolicy::default(), "rabbitmq", || {
        AmqpBroker::connect(&config.rabbitmq_url)
    })
    .await
    .expect("could not connect to RabbitMQ");
    let broker = Arc::new(broker);
    let publisher = broker
        .publisher(FULFILLMENT_QUEUE)
        .await
        .expect("failed to open publisher channel");

    // 4. Create collaborators and application state
    let payment = HttpPaymentGateway::new(&config.payment_url, config.payment_timeout)
        .expect("failed to build payment gateway client");
    let state = api::create_state(payment, QueueFulfillmentPublisher::new(publisher), {
        let broker = Arc::clone(&broker);
        move || broker.is_connected()
    });

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, payment_url = %config.payment_url, "starting cart service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }
    tracing::info!("server shut down gracefully");
}
