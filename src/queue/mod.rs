//! Bounded Queue Component
//!
//! A fixed-capacity FIFO queue that gives producers backpressure and hands
//! each item to exactly one consumer.
//!
//! # Overview
//!
//! - **Bounded**: at most `capacity` items are ever pending
//! - **Backpressure**: `enqueue` waits per the configured [`WaitStrategy`];
//!   `try_enqueue` fails fast with [`QueueError::Full`]
//! - **Two consumer modes**: a single registered consumer (ring buffer) or
//!   any number of competing consumers (work queue)
//! - **Sequence ordering**: every accepted item gets a monotonic sequence
//!   number starting at 1
//! - **Shutdown**: `close` stops producers; consumers drain what is left and
//!   then read `None`
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  ┌────────────┐
//! │ Producer A │  │ Producer B │
//! └─────┬──────┘  └─────┬──────┘
//!       │ enqueue       │ enqueue (waits on not_full)
//!       ▼               ▼
//! ┌─────────────────────────────────┐
//! │ BoundedQueue (Mutex + Condvars) │
//! │  ┌───┬───┬───┬───┬───┬───┐      │
//! │  │ 5 │ 6 │ 7 │ 8 │   │   │      │
//! │  └───┴───┴───┴───┴───┴───┘      │
//! └───────┬─────────────┬───────────┘
//!         │ dequeue     │ dequeue (waits on not_empty)
//! ┌───────┴───┐   ┌─────┴─────┐
//! │ Worker 0  │   │ Worker 1  │  (each item to one worker)
//! └───────────┘   └───────────┘
//! ```

pub mod api;
mod consumer;
mod error;
mod internal;
mod publisher;
mod types;
mod wait;

pub use consumer::QueueConsumer;
pub use error::{QueueError, QueueResult};
pub use internal::BoundedQueue;
pub use publisher::QueuePublisher;
pub use types::{ConsumerType, ProducerType, QueueConfig, WaitStrategy};

/// Point-in-time counters for a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    /// Items enqueued and not yet handed to a consumer
    pub pending: usize,
    pub total_enqueued: u64,
    pub total_dequeued: u64,
    /// Items removed by `drain` without being consumed
    pub total_drained: u64,
    pub consumers: usize,
    pub closed: bool,
}

#[cfg(test)]
mod tests;
