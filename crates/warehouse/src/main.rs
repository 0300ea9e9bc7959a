//! Warehouse service entry point.

use std::sync::Arc;

use broker::{AmqpBroker, RetryPolicy, connect_with_retry};
use common::FULFILLMENT_QUEUE;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use warehouse::{AggregateStats, Config, FulfillmentConsumer, WarehouseError};

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
            tracing::info!("received SIGINT, draining workers");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, draining workers");
        }
    }
}

async fn run(config: Config, stats: Arc<AggregateStats>) -> Result<(), WarehouseError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr())
        .install()
        .map_err(|e| WarehouseError::Metrics(e.to_string()))?;
    tracing::info!(addr = %config.metrics_addr(), "metrics exporter listening");

    let broker = connect_with_retry(&RetryPolicy::default(), "rabbitmq", || {
        AmqpBroker::connect(&config.rabbitmq_url)
    })
    .await?;
    let consumer = broker
        .consumer(FULFILLMENT_QUEUE, config.prefetch_count)
        .await?;
    tracing::info!(
        queue = FULFILLMENT_QUEUE,
        workers = config.worker_count,
        prefetch = config.prefetch_count,
        "consuming fulfillment orders"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let pool = FulfillmentConsumer::new(consumer, stats, config.worker_count);
    let result = pool.run(shutdown).await;

    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }
    result.map(|_| ())
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let stats = Arc::new(AggregateStats::new());
    let result = run(config, Arc::clone(&stats)).await;

    println!("\n{}", stats.snapshot());

    if let Err(e) = result {
        tracing::error!(error = %e, "warehouse service stopped with an error");
        std::process::exit(1);
    }
    tracing::info!("warehouse service stopped");
}
