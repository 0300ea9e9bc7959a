use async_trait::async_trait;

use crate::{Delivery, PublishOptions, Result};

/// Publishes messages to a single, pre-declared queue.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one message.
    ///
    /// Returns once the broker has accepted the message. There is no local
    /// buffering: a broker outage surfaces as an error to the caller.
    async fn publish(&self, payload: &[u8], options: PublishOptions) -> Result<()>;
}

/// Pulls messages from a queue with manual acknowledgement.
///
/// Every delivery returned by [`receive`](Consumer::receive) must eventually
/// be passed to exactly one of [`ack`](Consumer::ack) or
/// [`reject`](Consumer::reject). Deliveries that are neither acked nor
/// rejected when the consumer goes away are redelivered by the broker.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Waits for the next delivery.
    ///
    /// Returns `None` once the consumer has been cancelled or the broker
    /// closed the subscription. Cancel-safe: dropping the future loses no
    /// message.
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Acknowledges successful processing; the broker forgets the message.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Rejects a delivery. With `requeue == false` the message is dropped
    /// (or dead-lettered by the broker's own policy).
    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<()>;

    /// Stops further deliveries. Outstanding deliveries can still be acked.
    async fn cancel(&self) -> Result<()>;
}
