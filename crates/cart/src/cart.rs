//! The shopping cart.

use chrono::{DateTime, Utc};
use common::{CartId, CustomerId, LineItem, ProductId};

use crate::error::CartError;
use crate::value_objects::Quantity;

/// A customer's in-memory shopping cart.
///
/// Invariants: a product appears in at most one line, and every line has a
/// quantity of at least one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    customer_id: CustomerId,
    items: Vec<LineItem>,
    created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart with a fresh ID.
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: CartId::new(),
            customer_id,
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// Returns the lines in the order products were first added.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the line for a product, if present.
    pub fn get_item(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Adds `quantity` units of a product.
    ///
    /// An existing line for the product has its quantity increased;
    /// otherwise a new line is appended.
    pub fn add_item(&mut self, product_id: ProductId, quantity: Quantity) -> Result<(), CartError> {
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity.get()).ok_or_else(|| {
                    CartError::QuantityOverflow {
                        product_id: product_id.to_string(),
                    }
                })?;
            }
            None => self.items.push(LineItem {
                product_id,
                quantity: quantity.get(),
            }),
        }
        Ok(())
    }
}
