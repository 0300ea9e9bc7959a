//! Warehouse error types.

use thiserror::Error;

/// Errors that can stop the warehouse consumer.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The broker failed while receiving or settling messages.
    #[error("Broker error: {0}")]
    Broker(#[from] broker::BrokerError),

    /// A worker or intake task panicked.
    #[error("Worker task failed: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),

    /// The metrics exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;
