//! Cart service providing the create / get / add-item operations.

use std::sync::Arc;

use common::{CartId, CustomerId, ProductId};

use crate::cart::Cart;
use crate::error::CartError;
use crate::store::CartStore;
use crate::value_objects::Quantity;

/// Service for managing carts.
///
/// Wraps the shared [`CartStore`] with validation, logging and metrics.
#[derive(Clone)]
pub struct CartService {
    store: Arc<CartStore>,
}

impl CartService {
    /// Creates a new cart service over the given store.
    pub fn new(store: Arc<CartStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    /// Creates an empty cart for a customer.
    #[tracing::instrument(skip(self))]
    pub async fn create_cart(&self, customer_id: CustomerId) -> Cart {
        let cart = Cart::new(customer_id);
        self.store.insert(cart.clone()).await;

        metrics::counter!("carts_created_total").increment(1);
        tracing::info!(cart_id = %cart.id(), customer_id = %cart.customer_id(), "created cart");
        cart
    }

    /// Loads a cart by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, id: CartId) -> Result<Cart, CartError> {
        self.store.get(id).await.ok_or(CartError::NotFound(id))
    }

    /// Adds units of a product to a cart, merging into an existing line.
    ///
    /// The quantity is validated before the cart is looked up.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        let quantity = Quantity::new(quantity)?;

        let mut locked = self.store.lock(id).await.ok_or(CartError::NotFound(id))?;
        locked.update(|cart| cart.add_item(product_id.clone(), quantity))?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(cart_id = %id, %product_id, quantity = quantity.get(), "added item to cart");
        Ok(locked.cart().clone())
    }
}

#[cfg(test)]
mod tests {
    use common::LineItem;

    use super::*;

    fn service() -> CartService {
        CartService::new(Arc::new(CartStore::new()))
    }

    #[tokio::test]
    async fn test_create_and_get_cart() {
        let service = service();
        let cart = service.create_cart(CustomerId::new("C1")).await;

        let loaded = service.get_cart(cart.id()).await.unwrap();
        assert_eq!(loaded, cart);
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_cart() {
        let service = service();
        let id = CartId::new();
        assert_eq!(service.get_cart(id).await, Err(CartError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_add_item_merges() {
        let service = service();
        let cart = service.create_cart(CustomerId::new("C1")).await;

        service
            .add_item(cart.id(), ProductId::new("P1"), 2)
            .await
            .unwrap();
        let updated = service
            .add_item(cart.id(), ProductId::new("P1"), 3)
            .await
            .unwrap();

        assert_eq!(updated.items(), &[LineItem::new("P1", 5)]);
        assert_eq!(service.get_cart(cart.id()).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_add_item_to_unknown_cart() {
        let service = service();
        let id = CartId::new();
        let result = service.add_item(id, ProductId::new("P1"), 1).await;
        assert_eq!(result, Err(CartError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_add_item_invalid_quantity_leaves_cart_unchanged() {
        let service = service();
        let cart = service.create_cart(CustomerId::new("C1")).await;

        for bad in [0, -3, 10_001] {
            let result = service.add_item(cart.id(), ProductId::new("P1"), bad).await;
            assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
        }
        assert!(service.get_cart(cart.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_quantity_checked_before_lookup() {
        let service = service();
        let result = service.add_item(CartId::new(), ProductId::new("P1"), 0).await;
        assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
    }
}
