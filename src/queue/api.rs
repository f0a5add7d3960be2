//! Public API for the queue system
//!
//! External modules should import from here rather than from the
//! implementation modules.

pub use crate::queue::consumer::QueueConsumer;
pub use crate::queue::internal::BoundedQueue;
pub use crate::queue::publisher::QueuePublisher;

pub use crate::queue::types::{ConsumerType, ProducerType, QueueConfig, WaitStrategy};

pub use crate::queue::error::{QueueError, QueueResult};

pub use crate::queue::QueueStats;
