//! Fulfillment order publishing.

use async_trait::async_trait;
use broker::{PublishOptions, Publisher};
use common::FulfillmentOrder;

use crate::error::SagaError;
use crate::order_fulfillment::STEP_PUBLISH_FULFILLMENT;

/// Hands fulfillment orders to the warehouse.
#[async_trait]
pub trait FulfillmentPublisher: Send + Sync {
    /// Publishes one order durably. Returns once the broker has accepted it.
    async fn publish(&self, order: &FulfillmentOrder) -> Result<(), SagaError>;
}

/// Publishes fulfillment orders as persistent JSON messages on a broker queue.
#[derive(Clone)]
pub struct QueueFulfillmentPublisher<P> {
    publisher: P,
}

impl<P: Publisher> QueueFulfillmentPublisher<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<P: Publisher> FulfillmentPublisher for QueueFulfillmentPublisher<P> {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn publish(&self, order: &FulfillmentOrder) -> Result<(), SagaError> {
        let payload = order.to_bytes()?;
        self.publisher
            .publish(&payload, PublishOptions::persistent_json())
            .await
            .map_err(|e| SagaError::upstream(STEP_PUBLISH_FULFILLMENT, e))?;

        metrics::counter!("fulfillment_orders_published_total").increment(1);
        tracing::debug!(bytes = payload.len(), "fulfillment order published");
        Ok(())
    }
}
