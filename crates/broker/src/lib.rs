//! Message broker capability for the fulfillment pipeline.
//!
//! Producers and consumers talk to the broker through the [`Publisher`] and
//! [`Consumer`] traits so the checkout saga and the warehouse worker pool stay
//! broker-agnostic. Two implementations are provided:
//!
//! - [`InMemoryBroker`]: queues held in process memory, used by tests and
//!   local runs. Models prefetch, manual acknowledgement and redelivery of
//!   unacknowledged messages when a consumer goes away.
//! - [`AmqpBroker`]: RabbitMQ via `lapin`, with durable queues, persistent
//!   delivery, publisher confirms and manual acks.

pub mod amqp;
pub mod error;
pub mod memory;
pub mod message;
pub mod retry;
pub mod traits;

pub use amqp::{AmqpBroker, AmqpConsumer, AmqpPublisher};
pub use error::{BrokerError, Result};
pub use memory::{InMemoryBroker, InMemoryConsumer, InMemoryPublisher, QueueStats, QueuedMessage};
pub use message::{Delivery, PublishOptions};
pub use retry::{RetryPolicy, connect_with_retry};
pub use traits::{Consumer, Publisher};
