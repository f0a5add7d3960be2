//! Queue Consumer for pulling items
//!
//! Consumers compete for items: each item goes to exactly one consumer.
//! A consumer registers with the queue on creation and unregisters on drop,
//! so a single-consumer queue refuses a second live consumer.

use crate::queue::error::QueueResult;
use crate::queue::internal::BoundedQueue;
use std::sync::Arc;
use std::time::Duration;

/// Consumer handle for reading items from a [`BoundedQueue`]
///
/// # Example
///
/// ```rust
/// # use taskring::queue::api::BoundedQueue;
/// # use std::sync::Arc;
/// let queue = Arc::new(BoundedQueue::with_capacity("numbers", 8).unwrap());
/// let consumer = queue.consumer("worker-0").unwrap();
///
/// queue.enqueue(1).unwrap();
/// queue.enqueue(2).unwrap();
/// queue.close().unwrap();
///
/// let mut seen = Vec::new();
/// while let Some(item) = consumer.read().unwrap() {
///     seen.push(item);
/// }
/// assert_eq!(seen, vec![1, 2]);
/// ```
#[derive(Debug)]
pub struct QueueConsumer<T> {
    consumer_id: String,
    internal_consumer_id: u64,
    queue: Arc<BoundedQueue<T>>,
}

impl<T> QueueConsumer<T> {
    pub(crate) fn new(consumer_id: String, queue: Arc<BoundedQueue<T>>) -> QueueResult<Self> {
        let internal_consumer_id = queue.register_consumer()?;
        Ok(Self {
            consumer_id,
            internal_consumer_id,
            queue,
        })
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    pub fn internal_consumer_id(&self) -> u64 {
        self.internal_consumer_id
    }

    /// Read the next item, waiting while the queue is empty
    ///
    /// `Ok(None)` is the shutdown signal: closed and drained.
    pub fn read(&self) -> QueueResult<Option<T>> {
        self.queue.dequeue()
    }

    pub fn try_read(&self) -> QueueResult<Option<T>> {
        self.queue.try_dequeue()
    }

    pub fn read_timeout(&self, timeout: Duration) -> QueueResult<Option<T>> {
        self.queue.dequeue_timeout(timeout)
    }

    /// Read up to `batch_size` items that are available right now
    pub fn read_batch(&self, batch_size: usize) -> QueueResult<Vec<T>> {
        let mut batch = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.queue.try_dequeue()? {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        Ok(batch)
    }
}

impl<T> Drop for QueueConsumer<T> {
    fn drop(&mut self) {
        let _ = self.queue.unregister_consumer(self.internal_consumer_id);
    }
}

impl<T> BoundedQueue<T> {
    pub fn consumer(self: &Arc<Self>, consumer_id: impl Into<String>) -> QueueResult<QueueConsumer<T>> {
        QueueConsumer::new(consumer_id.into(), Arc::clone(self))
    }
}
