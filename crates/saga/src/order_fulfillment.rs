//! Checkout saga constants.

/// The saga type identifier for checkout.
pub const SAGA_TYPE: &str = "Checkout";

/// Step name: Authorize payment for the cart total.
pub const STEP_AUTHORIZE_PAYMENT: &str = "authorize_payment";

/// Step name: Publish the fulfillment order to the warehouse queue.
pub const STEP_PUBLISH_FULFILLMENT: &str = "publish_fulfillment";

/// Step name: Remove the checked-out cart from the store.
pub const STEP_CLEAR_CART: &str = "clear_cart";
