//! Warehouse side of the fulfillment pipeline.
//!
//! Consumes fulfillment orders from the durable queue with a bounded worker
//! pool, acknowledging each message manually after it has been counted into
//! the process-wide [`AggregateStats`].

pub mod config;
pub mod consumer;
pub mod error;
pub mod stats;

pub use config::Config;
pub use consumer::FulfillmentConsumer;
pub use error::{Result, WarehouseError};
pub use stats::{AggregateStats, StatsSnapshot};
