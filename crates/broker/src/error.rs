use thiserror::Error;

/// Errors that can occur when interacting with the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or the connection was refused.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A publish was not accepted by the broker.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The broker negatively confirmed a published message.
    #[error("Broker rejected published message on queue '{queue}'")]
    PublishNacked { queue: String },

    /// An acknowledgement or rejection referred to a delivery the broker
    /// does not consider outstanding.
    #[error("Unknown delivery tag {0}")]
    UnknownDelivery(u64),

    /// The named queue has not been declared.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// An AMQP protocol or channel error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
