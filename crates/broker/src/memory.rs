use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{BrokerError, Consumer, Delivery, PublishOptions, Publisher, Result};

/// A message sitting in a queue, together with the options it was published with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub body: Vec<u8>,
    pub options: PublishOptions,
    pub redelivered: bool,
}

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub ready: usize,
    pub unacked: usize,
    pub acked: u64,
    pub requeued: u64,
    /// Rejected without requeue.
    pub dropped: u64,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    /// Outstanding deliveries: tag -> (owning consumer, message).
    unacked: HashMap<u64, (u64, QueuedMessage)>,
    next_tag: u64,
    published: u64,
    acked: u64,
    requeued: u64,
    dropped: u64,
}

impl QueueState {
    fn in_flight_for(&self, consumer_id: u64) -> usize {
        self.unacked
            .values()
            .filter(|(owner, _)| *owner == consumer_id)
            .count()
    }
}

#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Queue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory broker for tests and local runs.
///
/// Queues live as long as the broker handle (and its clones). Messages are
/// "durable" only in the sense that a consumer disappearing does not lose
/// them: unacknowledged deliveries return to the front of the queue flagged
/// as redelivered.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, Arc<Queue>>>>,
    fail_on_publish: Arc<AtomicBool>,
    next_consumer_id: Arc<AtomicU64>,
}

impl InMemoryBroker {
    /// Creates a broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a queue. Declaring an existing queue is a no-op.
    pub fn declare_queue(&self, name: &str) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default();
    }

    /// Returns a publisher bound to the named queue.
    pub fn publisher(&self, queue: &str) -> InMemoryPublisher {
        InMemoryPublisher {
            broker: self.clone(),
            queue: queue.to_string(),
        }
    }

    /// Subscribes to a queue with the given prefetch bound (0 = unbounded).
    pub fn consumer(&self, queue: &str, prefetch: u16) -> Result<InMemoryConsumer> {
        let queue = self.queue(queue)?;
        Ok(InMemoryConsumer {
            queue,
            id: self.next_consumer_id.fetch_add(1, Ordering::Relaxed),
            prefetch: usize::from(prefetch),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Makes every subsequent publish fail, simulating a broker outage.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns counters for the named queue.
    pub fn stats(&self, queue: &str) -> Result<QueueStats> {
        let queue = self.queue(queue)?;
        let state = queue.lock();
        Ok(QueueStats {
            published: state.published,
            ready: state.ready.len(),
            unacked: state.unacked.len(),
            acked: state.acked,
            requeued: state.requeued,
            dropped: state.dropped,
        })
    }

    /// Returns a copy of the messages waiting in the queue, oldest first.
    pub fn ready_messages(&self, queue: &str) -> Result<Vec<QueuedMessage>> {
        let queue = self.queue(queue)?;
        let state = queue.lock();
        Ok(state.ready.iter().cloned().collect())
    }

    fn queue(&self, name: &str) -> Result<Arc<Queue>> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::QueueNotFound(name.to_string()))
    }
}

/// Publisher half of the in-memory broker.
#[derive(Clone)]
pub struct InMemoryPublisher {
    broker: InMemoryBroker,
    queue: String,
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, payload: &[u8], options: PublishOptions) -> Result<()> {
        if self.broker.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("broker unavailable".to_string()));
        }

        let queue = self.broker.queue(&self.queue)?;
        {
            let mut state = queue.lock();
            state.ready.push_back(QueuedMessage {
                body: payload.to_vec(),
                options,
                redelivered: false,
            });
            state.published += 1;
        }
        queue.notify.notify_waiters();
        Ok(())
    }
}

/// Consumer half of the in-memory broker.
///
/// Dropping the consumer returns its unacknowledged deliveries to the queue,
/// the same way a broker reclaims them when a channel closes.
pub struct InMemoryConsumer {
    queue: Arc<Queue>,
    id: u64,
    prefetch: usize,
    cancelled: AtomicBool,
}

impl InMemoryConsumer {
    fn settle(&self, tag: u64) -> Result<QueuedMessage> {
        let mut state = self.queue.lock();
        match state.unacked.remove(&tag) {
            Some((owner, message)) if owner == self.id => Ok(message),
            Some(entry) => {
                state.unacked.insert(tag, entry);
                Err(BrokerError::UnknownDelivery(tag))
            }
            None => Err(BrokerError::UnknownDelivery(tag)),
        }
    }
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn receive(&self) -> Result<Option<Delivery>> {
        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.cancelled.load(Ordering::SeqCst) {
                return Ok(None);
            }

            {
                let mut state = self.queue.lock();
                let has_capacity =
                    self.prefetch == 0 || state.in_flight_for(self.id) < self.prefetch;
                if has_capacity && let Some(message) = state.ready.pop_front() {
                    state.next_tag += 1;
                    let tag = state.next_tag;
                    let delivery = Delivery {
                        tag,
                        body: message.body.clone(),
                        redelivered: message.redelivered,
                    };
                    state.unacked.insert(tag, (self.id, message));
                    return Ok(Some(delivery));
                }
            }

            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.settle(delivery.tag)?;
        self.queue.lock().acked += 1;
        self.queue.notify.notify_waiters();
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        let mut message = self.settle(delivery.tag)?;
        {
            let mut state = self.queue.lock();
            if requeue {
                message.redelivered = true;
                state.ready.push_front(message);
                state.requeued += 1;
            } else {
                state.dropped += 1;
            }
        }
        self.queue.notify.notify_waiters();
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        self.queue.notify.notify_waiters();
        Ok(())
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        let mut orphaned: Vec<u64> = state
            .unacked
            .iter()
            .filter(|(_, (owner, _))| *owner == self.id)
            .map(|(tag, _)| *tag)
            .collect();
        if orphaned.is_empty() {
            return;
        }

        // Newest first so the oldest ends up at the front.
        orphaned.sort_unstable_by(|a, b| b.cmp(a));
        for tag in orphaned {
            if let Some((_, mut message)) = state.unacked.remove(&tag) {
                message.redelivered = true;
                state.ready.push_front(message);
            }
        }
        drop(state);
        self.queue.notify.notify_waiters();
    }
}
