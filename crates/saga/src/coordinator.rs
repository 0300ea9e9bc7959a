//! Cart coordinator: cart operations plus the checkout saga.

use std::sync::Arc;
use std::time::Instant;

use cart::{Cart, CartError, CartService, CartStore, FlatRatePricing, Money, PricingPolicy};
use common::{CartId, CustomerId, FulfillmentOrder, ProductId};

use crate::error::SagaError;
use crate::order_fulfillment;
use crate::services::fulfillment::FulfillmentPublisher;
use crate::services::payment::{PaymentDecision, PaymentGateway};

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub cart_id: CartId,
    pub transaction_id: String,
    pub total: Money,
}

/// Orchestrates cart operations and the checkout saga.
///
/// Checkout runs three steps (authorize payment, publish fulfillment order,
/// clear cart) as a single attempt with no internal retry. The cart's lock is
/// held for the whole saga, so concurrent checkouts of one cart run one after
/// the other and the second finds the cart gone.
pub struct CartCoordinator<P, F>
where
    P: PaymentGateway,
    F: FulfillmentPublisher,
{
    carts: CartService,
    payment: P,
    fulfillment: F,
    pricing: Box<dyn PricingPolicy>,
}

impl<P, F> CartCoordinator<P, F>
where
    P: PaymentGateway,
    F: FulfillmentPublisher,
{
    /// Creates a coordinator with flat $10-per-unit pricing.
    pub fn new(store: Arc<CartStore>, payment: P, fulfillment: F) -> Self {
        Self {
            carts: CartService::new(store),
            payment,
            fulfillment,
            pricing: Box::new(FlatRatePricing::default()),
        }
    }

    /// Replaces the pricing policy.
    pub fn with_pricing(mut self, pricing: impl PricingPolicy + 'static) -> Self {
        self.pricing = Box::new(pricing);
        self
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn store(&self) -> &Arc<CartStore> {
        self.carts.store()
    }

    pub fn payment(&self) -> &P {
        &self.payment
    }

    pub async fn create_cart(&self, customer_id: CustomerId) -> Cart {
        self.carts.create_cart(customer_id).await
    }

    pub async fn get_cart(&self, id: CartId) -> Result<Cart, SagaError> {
        Ok(self.carts.get_cart(id).await?)
    }

    pub async fn add_item(
        &self,
        id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, SagaError> {
        Ok(self.carts.add_item(id, product_id, quantity).await?)
    }

    /// Runs the checkout saga for a cart.
    ///
    /// On success the cart is deleted. On decline, invalid credential or any
    /// collaborator failure the cart is left exactly as it was.
    #[tracing::instrument(skip(self, credential), fields(saga_type = order_fulfillment::SAGA_TYPE))]
    pub async fn checkout(
        &self,
        cart_id: CartId,
        credential: &str,
    ) -> Result<CheckoutReceipt, SagaError> {
        let started = Instant::now();
        let result = self.run_checkout(cart_id, credential).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) => e.outcome(),
        };
        metrics::counter!("checkout_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn run_checkout(
        &self,
        cart_id: CartId,
        credential: &str,
    ) -> Result<CheckoutReceipt, SagaError> {
        let locked = self
            .store()
            .lock(cart_id)
            .await
            .ok_or(CartError::NotFound(cart_id))?;
        let cart = locked.cart();

        if cart.is_empty() {
            return Err(CartError::EmptyCart.into());
        }

        let total = self.pricing.total(cart.items());

        // Step 1: authorize payment
        tracing::info!(
            step = order_fulfillment::STEP_AUTHORIZE_PAYMENT,
            %total,
            "saga step started"
        );
        let transaction_id = match self.payment.authorize(credential, total).await? {
            PaymentDecision::Authorized { transaction_id, .. } => transaction_id,
            PaymentDecision::Declined { message } => {
                tracing::info!(%cart_id, "payment declined");
                return Err(SagaError::Declined {
                    message: message.unwrap_or_else(|| "Card declined".to_string()),
                });
            }
        };

        // Step 2: publish fulfillment order
        tracing::info!(
            step = order_fulfillment::STEP_PUBLISH_FULFILLMENT,
            %transaction_id,
            "saga step started"
        );
        let order = FulfillmentOrder::new(
            cart.id(),
            cart.customer_id().clone(),
            cart.items().to_vec(),
        );
        if let Err(e) = self.fulfillment.publish(&order).await {
            metrics::counter!("checkout_orphaned_authorizations_total").increment(1);
            tracing::error!(
                %cart_id,
                %transaction_id,
                error = %e,
                "payment authorized but fulfillment order was not published"
            );
            return Err(e);
        }

        // Step 3: clear cart
        tracing::info!(step = order_fulfillment::STEP_CLEAR_CART, "saga step started");
        self.store().remove(locked).await;

        tracing::info!(%cart_id, order_id = %order.order_id, %total, "checkout completed");
        Ok(CheckoutReceipt {
            order_id: order.order_id,
            cart_id,
            transaction_id,
            total,
        })
    }
}
