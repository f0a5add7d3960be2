//! Internal BoundedQueue implementation
//!
//! A fixed-capacity FIFO ring guarded by one mutex with two condition
//! variables:
//! - sequence numbers start at 1 and are assigned under the lock
//! - `not_full` wakes producers, `not_empty` wakes consumers
//! - closing wakes everybody; consumers keep draining until empty

use crate::core::sync::handle_mutex_poison;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::types::{ProducerType, QueueConfig};
use crate::queue::wait::poisoned;
use crate::queue::QueueStats;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
enum Wait {
    Never,
    Until(Instant),
    Forever,
}

impl Wait {
    fn timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Forever,
        }
    }

    /// Returns the deadline to idle until, or None when waiting must stop now
    fn next(&self) -> Option<Option<Instant>> {
        match *self {
            Wait::Never => None,
            Wait::Until(deadline) if Instant::now() >= deadline => None,
            Wait::Until(deadline) => Some(Some(deadline)),
            Wait::Forever => Some(None),
        }
    }
}

#[derive(Debug)]
struct QueueState<T> {
    buffer: VecDeque<T>,
    closed: bool,
    next_sequence: u64,
    total_enqueued: u64,
    total_dequeued: u64,
    total_drained: u64,
    consumers: HashSet<u64>,
}

/// Fixed-capacity multi-producer queue with blocking backpressure
#[derive(Debug)]
pub struct BoundedQueue<T> {
    config: QueueConfig,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    producing: AtomicBool,
    next_consumer_id: AtomicU64,
}

/// Marks a producer inside `enqueue` on a single-producer queue
struct ProducerGuard<'a>(Option<&'a AtomicBool>);

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.0 {
            flag.store(false, Ordering::Release);
        }
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(QueueState {
                // Allocated once; never grows past capacity
                buffer: VecDeque::with_capacity(config.capacity),
                closed: false,
                next_sequence: 1,
                total_enqueued: 0,
                total_dequeued: 0,
                total_drained: 0,
                consumers: HashSet::new(),
            }),
            config,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            producing: AtomicBool::new(false),
            next_consumer_id: AtomicU64::new(1),
        })
    }

    /// Multi-producer, shared-consumer queue with blocking waits
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> QueueResult<Self> {
        Self::new(QueueConfig::new(name, capacity))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, QueueState<T>>> {
        handle_mutex_poison(self.state.lock(), poisoned)
    }

    fn enter_producer(&self) -> ProducerGuard<'_> {
        if self.config.producer_type != ProducerType::Single {
            return ProducerGuard(None);
        }
        if self.producing.swap(true, Ordering::AcqRel) {
            log::warn!(
                "Concurrent enqueue on single-producer queue '{}'",
                self.config.name
            );
            return ProducerGuard(None);
        }
        ProducerGuard(Some(&self.producing))
    }

    /// Enqueue an item, waiting per the wait strategy while the queue is full
    ///
    /// Returns the sequence number assigned to the item.
    pub fn enqueue(&self, item: T) -> QueueResult<u64> {
        self.push(item, Wait::Forever)
    }

    /// Enqueue without waiting; `QueueError::Full` when no slot is free
    pub fn try_enqueue(&self, item: T) -> QueueResult<u64> {
        self.push(item, Wait::Never)
    }

    /// Enqueue, waiting at most `timeout` for a free slot
    pub fn enqueue_timeout(&self, item: T, timeout: Duration) -> QueueResult<u64> {
        self.push(item, Wait::timeout(timeout))
    }

    fn push(&self, item: T, wait: Wait) -> QueueResult<u64> {
        let _producer = self.enter_producer();
        let mut state = self.lock()?;
        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.buffer.len() < self.config.capacity {
                break;
            }
            let Some(deadline) = wait.next() else {
                return Err(QueueError::Full {
                    capacity: self.config.capacity,
                });
            };
            state = self
                .config
                .wait_strategy
                .idle(&self.state, &self.not_full, state, deadline)?;
        }

        state.buffer.push_back(item);
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.total_enqueued += 1;
        drop(state);

        self.not_empty.notify_one();
        Ok(sequence)
    }

    /// Dequeue the next item, waiting while the queue is empty
    ///
    /// `Ok(None)` means the queue is closed and fully drained.
    pub fn dequeue(&self) -> QueueResult<Option<T>> {
        self.pop(Wait::Forever)
    }

    /// Dequeue without waiting; `Ok(None)` when nothing is pending
    pub fn try_dequeue(&self) -> QueueResult<Option<T>> {
        self.pop(Wait::Never)
    }

    /// Dequeue, waiting at most `timeout` for an item
    pub fn dequeue_timeout(&self, timeout: Duration) -> QueueResult<Option<T>> {
        self.pop(Wait::timeout(timeout))
    }

    fn pop(&self, wait: Wait) -> QueueResult<Option<T>> {
        let mut state = self.lock()?;
        loop {
            if let Some(item) = state.buffer.pop_front() {
                state.total_dequeued += 1;
                drop(state);
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            if state.closed {
                return Ok(None);
            }
            let Some(deadline) = wait.next() else {
                return Ok(None);
            };
            state = self
                .config
                .wait_strategy
                .idle(&self.state, &self.not_empty, state, deadline)?;
        }
    }

    /// Close the queue to producers
    ///
    /// Pending items stay available to consumers. Returns false when the
    /// queue was already closed.
    pub fn close(&self) -> QueueResult<bool> {
        let mut state = self.lock()?;
        let was_open = !state.closed;
        state.closed = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        if was_open {
            log::debug!("Queue '{}' closed", self.config.name);
        }
        Ok(was_open)
    }

    /// Remove and return every pending item
    pub fn drain(&self) -> QueueResult<Vec<T>> {
        let mut state = self.lock()?;
        let drained: Vec<T> = state.buffer.drain(..).collect();
        state.total_drained += drained.len() as u64;
        drop(state);

        self.not_full.notify_all();
        Ok(drained)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.buffer.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.config.capacity.saturating_sub(self.len())
    }

    /// Register a consumer and return its id
    pub fn register_consumer(&self) -> QueueResult<u64> {
        let mut state = self.lock()?;
        if let Some(limit) = self.config.consumer_type.max_consumers() {
            if state.consumers.len() >= limit {
                return Err(QueueError::ConsumerLimit { limit });
            }
        }
        let consumer_id = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);
        state.consumers.insert(consumer_id);
        Ok(consumer_id)
    }

    pub fn unregister_consumer(&self, consumer_id: u64) -> QueueResult<bool> {
        let mut state = self.lock()?;
        Ok(state.consumers.remove(&consumer_id))
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        let state = self.lock()?;
        Ok(QueueStats {
            capacity: self.config.capacity,
            pending: state.buffer.len(),
            total_enqueued: state.total_enqueued,
            total_dequeued: state.total_dequeued,
            total_drained: state.total_drained,
            consumers: state.consumers.len(),
            closed: state.closed,
        })
    }
}
