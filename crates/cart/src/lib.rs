//! Cart domain for the order-fulfillment pipeline.
//!
//! This crate provides:
//! - `Cart` with merge-on-add line items
//! - `Money`, `Quantity` value objects and the pricing policy
//! - `CartStore`, a concurrent keyed store with per-cart exclusive access
//! - `CartService`, the create / get / add-item operations

pub mod cart;
pub mod error;
pub mod pricing;
pub mod service;
pub mod store;
pub mod value_objects;

pub use cart::Cart;
pub use error::CartError;
pub use pricing::{FlatRatePricing, PricingPolicy};
pub use service::CartService;
pub use store::{CartStore, LockedCart};
pub use value_objects::{Money, Quantity};
