//! Checkout saga for the shopping cart.
//!
//! The cart coordinator runs a single-attempt saga over two external
//! collaborators:
//! 1. Authorize payment with the payment gateway
//! 2. Publish a durable fulfillment order to the warehouse queue
//! 3. Clear the cart
//!
//! Steps commit individually; there is no compensating reversal when the
//! publish fails after an authorization.

pub mod coordinator;
pub mod error;
pub mod order_fulfillment;
pub mod services;

pub use coordinator::{CartCoordinator, CheckoutReceipt};
pub use error::SagaError;
pub use services::{
    FulfillmentPublisher, GatewayOutcome, HttpPaymentGateway, InMemoryPaymentGateway,
    PaymentDecision, PaymentGateway, QueueFulfillmentPublisher,
};
