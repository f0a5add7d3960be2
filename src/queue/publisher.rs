//! Queue Publisher for sending items
//!
//! A cheap, cloneable handle that producers hold instead of the queue itself.

use crate::queue::error::QueueResult;
use crate::queue::internal::BoundedQueue;
use std::sync::Arc;
use std::time::Duration;

/// Publisher handle for sending items to a [`BoundedQueue`]
///
/// # Example
///
/// ```rust
/// # use taskring::queue::api::BoundedQueue;
/// # use std::sync::Arc;
/// let queue = Arc::new(BoundedQueue::with_capacity("numbers", 8).unwrap());
/// let publisher = queue.publisher("producer-a");
///
/// let sequence = publisher.publish(42).unwrap();
/// assert_eq!(sequence, 1);
/// ```
#[derive(Debug)]
pub struct QueuePublisher<T> {
    producer_id: String,
    queue: Arc<BoundedQueue<T>>,
}

impl<T> Clone for QueuePublisher<T> {
    fn clone(&self) -> Self {
        Self {
            producer_id: self.producer_id.clone(),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> QueuePublisher<T> {
    pub(crate) fn new(producer_id: String, queue: Arc<BoundedQueue<T>>) -> Self {
        Self { producer_id, queue }
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    /// Publish an item, waiting while the queue is full
    pub fn publish(&self, item: T) -> QueueResult<u64> {
        self.queue.enqueue(item)
    }

    pub fn try_publish(&self, item: T) -> QueueResult<u64> {
        self.queue.try_enqueue(item)
    }

    pub fn publish_timeout(&self, item: T, timeout: Duration) -> QueueResult<u64> {
        self.queue.enqueue_timeout(item, timeout)
    }
}

impl<T> BoundedQueue<T> {
    pub fn publisher(self: &Arc<Self>, producer_id: impl Into<String>) -> QueuePublisher<T> {
        QueuePublisher::new(producer_id.into(), Arc::clone(self))
    }
}
