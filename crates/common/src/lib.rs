//! Shared types for the order-fulfillment pipeline.
//!
//! Both the cart service (producer) and the warehouse (consumer) depend on
//! this crate so the fulfillment message schema has a single definition.

pub mod fulfillment;
pub mod types;

pub use fulfillment::{FULFILLMENT_QUEUE, FulfillmentOrder, LineItem};
pub use types::{CartId, CustomerId, OrderId, ProductId};
