//! Fulfillment consumer: intake task, bounded buffer and worker pool.

use std::sync::Arc;

use broker::{Consumer, Delivery};
use common::FulfillmentOrder;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stats::{AggregateStats, StatsSnapshot};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Delivery>>>;

/// What a worker did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Processed,
    Rejected,
}

/// Per-worker tally, logged when the worker stops.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    processed: u64,
    rejected: u64,
}

/// Consumes fulfillment orders with a fixed pool of workers.
///
/// One intake task pulls deliveries from the broker and forwards them into a
/// bounded buffer of `2 × workers`; each worker pulls from that buffer,
/// records the order and acks it. Messages that do not deserialize are
/// rejected without requeue. Every delivery is settled explicitly, so a crash
/// between recording and ack leads to redelivery (at-least-once).
pub struct FulfillmentConsumer<C> {
    consumer: Arc<C>,
    stats: Arc<AggregateStats>,
    workers: usize,
}

impl<C> FulfillmentConsumer<C>
where
    C: Consumer + 'static,
{
    /// Creates a consumer with `workers` worker tasks (at least one).
    pub fn new(consumer: C, stats: Arc<AggregateStats>, workers: usize) -> Self {
        Self {
            consumer: Arc::new(consumer),
            stats,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Capacity of the buffer between intake and workers.
    pub fn buffer_capacity(&self) -> usize {
        self.workers * 2
    }

    /// Runs until `shutdown` fires or the broker ends the subscription.
    ///
    /// On shutdown the intake stops pulling and cancels the broker consumer;
    /// deliveries already handed to the buffer are processed to completion
    /// and every worker is joined before the final snapshot is taken.
    #[tracing::instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) -> Result<StatsSnapshot> {
        let (tx, rx) = mpsc::channel(self.buffer_capacity());
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        let workers: Vec<JoinHandle<WorkerReport>> = (0..self.workers)
            .map(|worker_id| {
                tokio::spawn(worker(
                    worker_id,
                    Arc::clone(&self.consumer),
                    Arc::clone(&rx),
                    Arc::clone(&self.stats),
                ))
            })
            .collect();
        tracing::info!(workers = self.workers, "started fulfillment workers");

        let intake = tokio::spawn(intake(Arc::clone(&self.consumer), tx, shutdown));

        // The intake drops its sender on exit, which lets the workers drain
        // the buffer and stop.
        let intake_result = intake.await;

        let mut processed = 0;
        let mut rejected = 0;
        let mut first_panic = None;
        for handle in workers {
            match handle.await {
                Ok(report) => {
                    processed += report.processed;
                    rejected += report.rejected;
                }
                Err(e) => {
                    tracing::error!(error = %e, "fulfillment worker panicked");
                    first_panic.get_or_insert(e);
                }
            }
        }

        let received = intake_result??;
        if let Some(e) = first_panic {
            return Err(e.into());
        }
        tracing::info!(received, processed, rejected, "all workers stopped");

        Ok(self.stats.snapshot())
    }
}

/// Pulls deliveries from the broker into the buffer until cancelled.
///
/// Returns the number of deliveries forwarded.
async fn intake<C: Consumer>(
    consumer: Arc<C>,
    tx: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
) -> Result<u64> {
    let mut received = 0;

    let result = loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("shutdown requested, stopping intake");
                break Ok(received);
            }
            next = consumer.receive() => next,
        };

        match next {
            Ok(Some(delivery)) => {
                received += 1;
                if tx.send(delivery).await.is_err() {
                    // Every worker is gone; the delivery returns to the broker
                    // as unacknowledged.
                    tracing::error!("no workers left to accept deliveries");
                    break Ok(received);
                }
            }
            Ok(None) => {
                tracing::info!("broker ended the subscription");
                break Ok(received);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to receive from broker");
                break Err(e.into());
            }
        }
    };

    if let Err(e) = consumer.cancel().await {
        tracing::warn!(error = %e, "failed to cancel broker consumer");
    }
    result
}

async fn worker<C: Consumer>(
    worker_id: usize,
    consumer: Arc<C>,
    rx: SharedReceiver,
    stats: Arc<AggregateStats>,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    loop {
        let next = rx.lock().await.recv().await;
        let Some(delivery) = next else { break };

        metrics::gauge!("fulfillment_worker_busy").increment(1.0);
        match handle_delivery(worker_id, consumer.as_ref(), &stats, &delivery).await {
            Outcome::Processed => report.processed += 1,
            Outcome::Rejected => report.rejected += 1,
        }
        metrics::gauge!("fulfillment_worker_busy").decrement(1.0);
    }

    tracing::debug!(
        worker_id,
        processed = report.processed,
        rejected = report.rejected,
        "worker stopped"
    );
    report
}

/// Processes one delivery and settles it with the broker.
async fn handle_delivery<C: Consumer>(
    worker_id: usize,
    consumer: &C,
    stats: &AggregateStats,
    delivery: &Delivery,
) -> Outcome {
    let order = match FulfillmentOrder::from_bytes(&delivery.body) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(
                worker_id,
                tag = delivery.tag,
                error = %e,
                "dropping malformed fulfillment message"
            );
            metrics::counter!("fulfillment_messages_rejected_total").increment(1);
            if let Err(e) = consumer.reject(delivery, false).await {
                tracing::warn!(worker_id, tag = delivery.tag, error = %e, "failed to reject message");
            }
            return Outcome::Rejected;
        }
    };

    stats.record(&order);

    match consumer.ack(delivery).await {
        Ok(()) => {
            metrics::counter!("fulfillment_messages_processed_total").increment(1);
            tracing::info!(
                worker_id,
                order_id = %order.order_id,
                cart_id = %order.cart_id,
                redelivered = delivery.redelivered,
                "processed order"
            );
        }
        Err(e) => {
            // The broker will redeliver; the order is then counted twice.
            metrics::counter!("fulfillment_ack_failures_total").increment(1);
            tracing::warn!(
                worker_id,
                order_id = %order.order_id,
                error = %e,
                "failed to acknowledge message"
            );
        }
    }
    Outcome::Processed
}
