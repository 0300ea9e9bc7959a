//! External collaborator traits and implementations for the checkout saga.

pub mod fulfillment;
pub mod payment;

pub use fulfillment::{FulfillmentPublisher, QueueFulfillmentPublisher};
pub use payment::{
    GatewayOutcome, HttpPaymentGateway, InMemoryPaymentGateway, PaymentDecision, PaymentGateway,
};
