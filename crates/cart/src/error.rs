use common::CartId;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// No cart with this ID is in the store.
    #[error("Cart not found: {0}")]
    NotFound(CartId),

    /// Requested quantity is outside the accepted range.
    #[error("Invalid quantity: {quantity} (must be between {min} and {max})")]
    InvalidQuantity { quantity: i64, min: u32, max: u32 },

    /// Merging would push a line past what a quantity can hold.
    #[error("Quantity overflow for product {product_id}")]
    QuantityOverflow { product_id: String },

    /// Checkout was attempted on a cart with no items.
    #[error("Cannot checkout empty cart")]
    EmptyCart,
}
