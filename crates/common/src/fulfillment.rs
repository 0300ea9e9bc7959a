//! Fulfillment message schema shared by the cart service and the warehouse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CartId, CustomerId, OrderId, ProductId};

/// Name of the durable queue carrying fulfillment orders.
pub const FULFILLMENT_QUEUE: &str = "warehouse_orders";

/// A single product line: product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// An order handed from checkout to the warehouse.
///
/// Wire form:
/// ```text
/// {"order_id": string, "cart_id": string, "customer_id": string,
///  "items": [{"product_id": string, "quantity": int}], "timestamp": RFC3339}
/// ```
///
/// The cart service mints UUIDs for both ids, but consumers accept any
/// string. There is no schema version field; consumers reject anything that
/// does not deserialize into this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentOrder {
    pub order_id: String,
    pub cart_id: String,
    pub customer_id: CustomerId,
    pub items: Vec<LineItem>,
    pub timestamp: DateTime<Utc>,
}

impl FulfillmentOrder {
    /// Builds a new order with a fresh order ID, stamped now.
    pub fn new(cart_id: CartId, customer_id: CustomerId, items: Vec<LineItem>) -> Self {
        Self {
            order_id: OrderId::new().to_string(),
            cart_id: cart_id.to_string(),
            customer_id,
            items,
            timestamp: Utc::now(),
        }
    }

    /// Serializes the order to its JSON wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses an order from its JSON wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
